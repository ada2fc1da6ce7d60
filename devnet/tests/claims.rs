//! Faucet claims: once per account, re-checked on-chain, serialized per
//! token.

mod common;

use common::{devnet, user_client, OTHER_NETWORK};
use ctoken_protocol::chain::ContractMethod;
use ctoken_protocol::disclosure::RevealOutcome;
use ctoken_protocol::wallet::Wallet;
use ctoken_protocol::{EngineError, Outcome, TokenSymbol};

#[tokio::test]
async fn second_claim_is_already_claimed_without_encrypting() {
    let devnet = devnet();
    let (wallet, client) = user_client(&devnet);

    assert_eq!(
        client.can_claim(&TokenSymbol::ZBtc).await.unwrap(),
        Outcome::Completed(true)
    );
    let outcome = client.claim(&TokenSymbol::ZBtc, 1).await.unwrap();
    assert!(outcome.completed().is_some());
    assert_eq!(
        client.claims().cached(wallet.address(), &TokenSymbol::ZBtc),
        Some(true)
    );

    let encryptions = devnet.coprocessor().encryptions();
    let err = client.claim(&TokenSymbol::ZBtc, 1).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::AlreadyClaimed {
            account: wallet.address(),
            symbol: TokenSymbol::ZBtc
        }
    );
    assert_eq!(devnet.coprocessor().encryptions(), encryptions);
    assert_eq!(devnet.chain().transactions(ContractMethod::Faucet), 1);
    assert_eq!(
        client.can_claim(&TokenSymbol::ZBtc).await.unwrap(),
        Outcome::Completed(false)
    );
}

#[tokio::test]
async fn claims_are_per_token() {
    let devnet = devnet();
    let (_, client) = user_client(&devnet);

    client.claim(&TokenSymbol::ZBtc, 1).await.unwrap();
    assert_eq!(
        client.can_claim(&TokenSymbol::ZUsd).await.unwrap(),
        Outcome::Completed(true)
    );
    client.claim(&TokenSymbol::ZUsd, 100).await.unwrap();
    assert_eq!(devnet.chain().transactions(ContractMethod::Faucet), 2);
}

#[tokio::test]
async fn claim_from_another_tab_is_seen_before_encrypting() {
    let devnet = devnet();
    let (wallet, first_tab) = user_client(&devnet);
    let second_tab = devnet.client(wallet.clone(), devnet.config()).unwrap();

    // The first tab's cached answer goes out of date.
    assert_eq!(
        first_tab.can_claim(&TokenSymbol::ZEth).await.unwrap(),
        Outcome::Completed(true)
    );
    second_tab.claim(&TokenSymbol::ZEth, 5).await.unwrap();

    let encryptions = devnet.coprocessor().encryptions();
    let err = first_tab.claim(&TokenSymbol::ZEth, 5).await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadyClaimed { .. }));
    assert_eq!(devnet.coprocessor().encryptions(), encryptions);
    assert_eq!(devnet.chain().transactions(ContractMethod::Faucet), 1);
}

#[tokio::test]
async fn concurrent_claims_send_one_transaction() {
    let devnet = devnet();
    let (_, client) = user_client(&devnet);

    let results =
        futures::future::join_all((0..4).map(|_| client.claim(&TokenSymbol::ZBtc, 1))).await;

    let mut completed = 0;
    for result in results {
        match result {
            Ok(outcome) if outcome.is_busy() => {}
            Ok(outcome) => {
                assert!(outcome.completed().is_some());
                completed += 1;
            }
            Err(err) => assert!(matches!(err, EngineError::AlreadyClaimed { .. })),
        }
    }
    assert_eq!(completed, 1);
    assert_eq!(devnet.chain().transactions(ContractMethod::Faucet), 1);
}

#[tokio::test]
async fn claimed_tokens_are_revealed_and_refreshed() {
    let devnet = devnet();
    let (_, client) = user_client(&devnet);

    client.claim(&TokenSymbol::ZUsd, 250).await.unwrap();

    let status = client
        .orchestrator()
        .last_balance(&TokenSymbol::ZUsd)
        .expect("confirmed claim refreshes the balance");
    assert!(status.has_balance);

    let RevealOutcome::Decrypted(balance) = client.reveal_balance(&TokenSymbol::ZUsd).await.unwrap()
    else {
        panic!("expected a decrypted balance");
    };
    assert_eq!(balance.display, "250");
    assert_eq!(balance.handle, status.handle);
}

#[tokio::test]
async fn claiming_for_another_account_is_refused() {
    let devnet = devnet();
    let (_, client) = user_client(&devnet);
    let (other, _) = user_client(&devnet);

    let err = client
        .claims()
        .claim(other.address(), &TokenSymbol::ZUsd, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AccountMismatch { .. }));
    assert_eq!(devnet.chain().total_transactions(), 0);
}

#[tokio::test]
async fn network_switch_during_claim_check_is_abandoned() {
    let devnet = devnet();
    let (wallet, client) = user_client(&devnet);

    let (checked, _) = tokio::join!(client.can_claim(&TokenSymbol::ZBtc), async {
        client.switch_network(OTHER_NETWORK)
    });
    assert_eq!(checked.unwrap(), Outcome::Abandoned);
    assert_eq!(client.claims().cached(wallet.address(), &TokenSymbol::ZBtc), None);
}
