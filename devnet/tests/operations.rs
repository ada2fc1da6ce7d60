//! Orchestrated operations against the devnet: mint, burn, transfers,
//! batch variants, failure taxonomy, and mid-flight network switches.

mod common;

use std::sync::Arc;

use common::{addr, devnet, owner_client, user_client, HookedEncryptor, OTHER_NETWORK};
use ctoken_protocol::chain::ContractMethod;
use ctoken_protocol::disclosure::RevealOutcome;
use ctoken_protocol::events::EventKind;
use ctoken_protocol::wallet::Wallet;
use ctoken_protocol::{EngineError, Operation, TokenSymbol};

// ---------------------------------------------------------------------------
// Happy paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mint_then_reveal_shows_whole_units() {
    let devnet = devnet();
    let owner = owner_client(&devnet);
    let (wallet, holder) = user_client(&devnet);

    let outcome = owner
        .mint(&TokenSymbol::ZUsd, wallet.address(), 1000)
        .await
        .unwrap();
    let receipt = outcome.completed().expect("mint should complete");
    assert!(receipt.succeeded());

    let status = holder
        .refresh_balance(&TokenSymbol::ZUsd)
        .await
        .unwrap()
        .completed()
        .unwrap();
    assert!(status.has_balance);
    assert!(!status.handle.is_zero());

    match holder.reveal_balance(&TokenSymbol::ZUsd).await.unwrap() {
        RevealOutcome::Decrypted(balance) => {
            assert_eq!(balance.display, "1000");
            assert_eq!(balance.whole, 1000);
            assert_eq!(balance.raw, 1_000_000_000);
            assert_eq!(balance.handle, status.handle);
        }
        other => panic!("expected a decrypted balance, got {other:?}"),
    }
}

#[tokio::test]
async fn decrypted_balance_matches_minted_amount() {
    let devnet = devnet();
    let owner = owner_client(&devnet);

    for (token, amount) in [
        (TokenSymbol::ZUsd, 1u64),
        (TokenSymbol::ZBtc, 21),
        (TokenSymbol::ZEth, 123_456),
    ] {
        let (wallet, holder) = user_client(&devnet);
        owner.mint(&token, wallet.address(), amount).await.unwrap();

        let RevealOutcome::Decrypted(balance) = holder.reveal_balance(&token).await.unwrap() else {
            panic!("{token}: expected a decrypted balance");
        };
        assert_eq!(balance.whole, amount as u128, "{token}");
        assert_eq!(balance.display, amount.to_string(), "{token}");
    }
}

#[tokio::test]
async fn transfer_moves_balance_between_accounts() {
    let devnet = devnet();
    let owner = owner_client(&devnet);
    let (alice_wallet, alice) = user_client(&devnet);
    let (bob_wallet, bob) = user_client(&devnet);

    owner
        .mint(&TokenSymbol::ZEth, alice_wallet.address(), 50)
        .await
        .unwrap();
    let outcome = alice
        .transfer(&TokenSymbol::ZEth, bob_wallet.address(), 20)
        .await
        .unwrap();
    assert!(outcome.completed().is_some());
    assert_eq!(
        devnet
            .chain()
            .transactions(ContractMethod::BatchConfidentialTransfer),
        1
    );

    let RevealOutcome::Decrypted(alice_balance) =
        alice.reveal_balance(&TokenSymbol::ZEth).await.unwrap()
    else {
        panic!("alice should hold a balance");
    };
    let RevealOutcome::Decrypted(bob_balance) =
        bob.reveal_balance(&TokenSymbol::ZEth).await.unwrap()
    else {
        panic!("bob should hold a balance");
    };
    assert_eq!(alice_balance.whole, 30);
    assert_eq!(bob_balance.whole, 20);
}

#[tokio::test]
async fn batch_mint_and_batch_transfer_credit_every_recipient() {
    let devnet = devnet();
    let owner = owner_client(&devnet);
    let (sender_wallet, sender) = user_client(&devnet);
    let (a_wallet, a) = user_client(&devnet);
    let (b_wallet, b) = user_client(&devnet);

    owner
        .batch_mint(
            &TokenSymbol::ZUsd,
            vec![sender_wallet.address(), a_wallet.address()],
            vec![100, 5],
        )
        .await
        .unwrap();
    sender
        .batch_transfer(
            &TokenSymbol::ZUsd,
            vec![a_wallet.address(), b_wallet.address()],
            vec![10, 15],
        )
        .await
        .unwrap();

    let whole = |outcome: RevealOutcome| match outcome {
        RevealOutcome::Decrypted(balance) => balance.whole,
        other => panic!("expected a balance, got {other:?}"),
    };
    assert_eq!(whole(sender.reveal_balance(&TokenSymbol::ZUsd).await.unwrap()), 75);
    assert_eq!(whole(a.reveal_balance(&TokenSymbol::ZUsd).await.unwrap()), 15);
    assert_eq!(whole(b.reveal_balance(&TokenSymbol::ZUsd).await.unwrap()), 15);
}

#[tokio::test]
async fn burn_reduces_holder_balance() {
    let devnet = devnet();
    let owner = owner_client(&devnet);
    let (wallet, holder) = user_client(&devnet);

    owner
        .mint(&TokenSymbol::ZBtc, wallet.address(), 10)
        .await
        .unwrap();
    owner
        .burn(&TokenSymbol::ZBtc, wallet.address(), 4)
        .await
        .unwrap();

    let RevealOutcome::Decrypted(balance) = holder.reveal_balance(&TokenSymbol::ZBtc).await.unwrap()
    else {
        panic!("expected a balance");
    };
    assert_eq!(balance.whole, 6);
    assert_eq!(balance.decimals, 6);
}

#[tokio::test]
async fn confirmed_operation_reports_progress_then_success() {
    let devnet = devnet();
    let owner = owner_client(&devnet);
    let mut events = owner.subscribe();

    owner
        .mint(&TokenSymbol::ZUsd, addr(0x11), 1)
        .await
        .unwrap();

    let mut kinds = Vec::new();
    let mut op_ids = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.token, TokenSymbol::ZUsd);
        op_ids.push(event.op_id);
        kinds.push(event.kind);
    }
    assert!(op_ids.windows(2).all(|w| w[0] == w[1]));
    assert!(matches!(kinds.first(), Some(EventKind::Progress { step }) if step == "encrypting"));
    assert!(kinds
        .iter()
        .any(|k| matches!(k, EventKind::Submitted { .. })));
    assert!(matches!(kinds.last(), Some(EventKind::Succeeded { .. })));
    assert!(!kinds.iter().any(|k| matches!(k, EventKind::Failed { .. })));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn batch_arity_mismatch_sends_nothing() {
    let devnet = devnet();
    let owner = owner_client(&devnet);

    let err = owner
        .batch_mint(
            &TokenSymbol::ZUsd,
            vec![addr(1), addr(2), addr(3)],
            vec![1, 2],
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        EngineError::ArityMismatch {
            recipients: 3,
            amounts: 2
        }
    );
    assert_eq!(devnet.coprocessor().encryptions(), 0);
    assert_eq!(devnet.chain().total_transactions(), 0);
}

#[tokio::test]
async fn non_owner_mint_reverts_and_releases_the_guard() {
    let devnet = devnet();
    let owner = owner_client(&devnet);
    let (_, user) = user_client(&devnet);

    let err = user
        .mint(&TokenSymbol::ZUsd, addr(9), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::TransactionReverted { tx_hash: Some(_), .. }));
    assert!(!user
        .orchestrator()
        .guards()
        .is_held(&TokenSymbol::ZUsd, ctoken_protocol::guard::GuardKind::Minting));

    // Overdrawn transfer on the same client still runs, and reverts.
    let err = user
        .transfer(&TokenSymbol::ZUsd, addr(9), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::TransactionReverted { .. }));

    owner.mint(&TokenSymbol::ZUsd, addr(9), 1).await.unwrap();
}

#[tokio::test]
async fn declined_transaction_is_user_rejected() {
    let devnet = devnet();
    let owner = owner_client(&devnet);
    let mut events = owner.subscribe();

    devnet.chain().reject_next_transaction();
    let err = owner
        .mint(&TokenSymbol::ZUsd, addr(3), 1)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::UserRejected);

    let mut failures = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event.kind, EventKind::Failed { .. }) {
            failures += 1;
        }
    }
    assert_eq!(failures, 1);

    assert!(owner
        .mint(&TokenSymbol::ZUsd, addr(3), 1)
        .await
        .unwrap()
        .completed()
        .is_some());
}

#[tokio::test]
async fn encryption_not_ready_sends_nothing() {
    let devnet = devnet();
    let owner = owner_client(&devnet);

    devnet.coprocessor().set_ready(false);
    let err = owner
        .mint(&TokenSymbol::ZUsd, addr(4), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::EncryptionUnavailable(_)));

    owner.detach_encryption();
    devnet.coprocessor().set_ready(true);
    let err = owner
        .mint(&TokenSymbol::ZUsd, addr(4), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::EncryptionUnavailable(_)));

    assert_eq!(devnet.chain().total_transactions(), 0);
}

#[tokio::test]
async fn undeployed_network_is_not_deployed() {
    let devnet = devnet();
    let owner = owner_client(&devnet);
    owner.switch_network(OTHER_NETWORK);

    let err = owner
        .mint(&TokenSymbol::ZBtc, addr(5), 1)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::NotDeployed {
            symbol: TokenSymbol::ZBtc,
            network_id: OTHER_NETWORK
        }
    );
    assert_eq!(devnet.coprocessor().encryptions(), 0);
}

#[tokio::test]
async fn unknown_symbol_is_rejected() {
    let devnet = devnet();
    let owner = owner_client(&devnet);
    let err = owner
        .mint(&TokenSymbol::parse("zDOGE"), addr(5), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownSymbol(_)));
}

// ---------------------------------------------------------------------------
// Mid-flight network switches
// ---------------------------------------------------------------------------

/// Submits `op` on zUSD with a network switch injected while its inputs
/// are being encrypted.
async fn assert_abandoned_when_network_switches(op: Operation) {
    let devnet = devnet();
    let client = owner_client(&devnet);
    let hooked = HookedEncryptor::new(devnet.coprocessor().clone());
    client.attach_encryption(hooked.clone());
    let mut events = client.subscribe();

    let switcher = Arc::clone(&client);
    hooked.on_next_encrypt(move || switcher.switch_network(OTHER_NETWORK));

    let name = op.name();
    let outcome = client.submit(&TokenSymbol::ZUsd, op).await.unwrap();
    assert!(outcome.is_abandoned(), "{name} should be abandoned");
    assert_eq!(devnet.chain().total_transactions(), 0, "{name} sent a transaction");

    while let Ok(event) = events.try_recv() {
        assert!(
            matches!(event.kind, EventKind::Progress { .. }),
            "{name} emitted {:?} after abandoning",
            event.kind
        );
    }
    assert!(!client
        .orchestrator()
        .guards()
        .is_held(&TokenSymbol::ZUsd, ctoken_protocol::guard::GuardKind::Minting));
}

#[tokio::test]
async fn every_operation_abandons_on_network_switch() {
    let ops = [
        Operation::Mint {
            to: addr(1),
            amount: 10,
        },
        Operation::Burn {
            from: addr(1),
            amount: 10,
        },
        Operation::Transfer {
            to: addr(2),
            amount: 1,
        },
        Operation::BatchTransfer {
            recipients: vec![addr(2), addr(3)],
            amounts: vec![1, 2],
        },
        Operation::BatchMint {
            recipients: vec![addr(2), addr(3)],
            amounts: vec![1, 2],
        },
        Operation::FaucetClaim { amount: 100 },
    ];
    for op in ops {
        assert_abandoned_when_network_switches(op).await;
    }
}

#[tokio::test]
async fn concurrent_operation_on_same_token_is_busy() {
    let devnet = devnet();
    let owner = owner_client(&devnet);

    let (first, second) = tokio::join!(
        owner.mint(&TokenSymbol::ZUsd, addr(1), 1),
        owner.mint(&TokenSymbol::ZUsd, addr(2), 1),
    );
    assert!(first.unwrap().completed().is_some());
    assert!(second.unwrap().is_busy());
    assert_eq!(devnet.chain().transactions(ContractMethod::MintConfidential), 1);

    // Different tokens do not contend.
    let (usd, btc) = tokio::join!(
        owner.mint(&TokenSymbol::ZUsd, addr(1), 1),
        owner.mint(&TokenSymbol::ZBtc, addr(1), 1),
    );
    assert!(usd.unwrap().completed().is_some());
    assert!(btc.unwrap().completed().is_some());
}
