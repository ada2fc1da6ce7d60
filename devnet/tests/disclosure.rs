//! Balance reveals: disclosure, consent signing, and oracle decryption.

mod common;

use std::sync::Arc;

use common::{addr, devnet, owner_client, user_client};
use ctoken_devnet::DevnetWallet;
use ctoken_protocol::chain::ContractMethod;
use ctoken_protocol::config::DisclosureMode;
use ctoken_protocol::disclosure::RevealOutcome;
use ctoken_protocol::events::EventKind;
use ctoken_protocol::wallet::Wallet;
use ctoken_protocol::{EngineConfig, EngineError, TokenSymbol};

#[tokio::test]
async fn empty_balance_skips_disclosure() {
    let devnet = devnet();
    let (wallet, client) = user_client(&devnet);

    let outcome = client.reveal_balance(&TokenSymbol::ZUsd).await.unwrap();
    assert_eq!(outcome, RevealOutcome::NoBalance);
    assert_eq!(devnet.chain().total_transactions(), 0);
    assert_eq!(wallet.prompts(), 0);
    assert_eq!(devnet.oracle().requests(), 0);
}

#[tokio::test]
async fn every_reveal_discloses_first() {
    let devnet = devnet();
    let owner = owner_client(&devnet);
    let (wallet, client) = user_client(&devnet);
    owner
        .mint(&TokenSymbol::ZUsd, wallet.address(), 7)
        .await
        .unwrap();

    for _ in 0..2 {
        assert!(matches!(
            client.reveal_balance(&TokenSymbol::ZUsd).await.unwrap(),
            RevealOutcome::Decrypted(_)
        ));
    }
    assert_eq!(
        devnet
            .chain()
            .transactions(ContractMethod::DiscloseEncryptedAmount),
        2
    );
    assert_eq!(wallet.prompts(), 2);
}

#[tokio::test]
async fn allow_self_mode_authorizes_without_a_handle() {
    let devnet = devnet();
    let owner = owner_client(&devnet);
    let wallet = Arc::new(DevnetWallet::generate());
    let config = EngineConfig {
        disclosure_mode: DisclosureMode::AllowSelf,
        ..devnet.config()
    };
    let client = devnet.client(wallet.clone(), config).unwrap();
    owner
        .mint(&TokenSymbol::ZEth, wallet.address(), 3)
        .await
        .unwrap();

    let RevealOutcome::Decrypted(balance) = client.reveal_balance(&TokenSymbol::ZEth).await.unwrap()
    else {
        panic!("expected a decrypted balance");
    };
    assert_eq!(balance.whole, 3);
    assert_eq!(
        devnet
            .chain()
            .transactions(ContractMethod::AllowSelfBalanceDecrypt),
        1
    );
    assert_eq!(
        devnet
            .chain()
            .transactions(ContractMethod::DiscloseEncryptedAmount),
        0
    );
}

#[tokio::test]
async fn declined_consent_is_user_rejected_and_retryable() {
    let devnet = devnet();
    let owner = owner_client(&devnet);
    let (wallet, client) = user_client(&devnet);
    owner
        .mint(&TokenSymbol::ZUsd, wallet.address(), 42)
        .await
        .unwrap();

    wallet.reject_next_prompt();
    let err = client.reveal_balance(&TokenSymbol::ZUsd).await.unwrap_err();
    assert_eq!(err, EngineError::UserRejected);
    assert_eq!(devnet.oracle().requests(), 0);
    assert!(!client
        .disclosure()
        .is_in_flight(wallet.address(), &TokenSymbol::ZUsd));

    let RevealOutcome::Decrypted(balance) = client.reveal_balance(&TokenSymbol::ZUsd).await.unwrap()
    else {
        panic!("retry should decrypt");
    };
    assert_eq!(balance.display, "42");
}

#[tokio::test]
async fn boolean_answer_is_invalid_result() {
    let devnet = devnet();
    let owner = owner_client(&devnet);
    let (wallet, client) = user_client(&devnet);
    owner
        .mint(&TokenSymbol::ZUsd, wallet.address(), 1)
        .await
        .unwrap();
    let mut events = client.subscribe();

    devnet.oracle().answer_with_booleans(true);
    let err = client.reveal_balance(&TokenSymbol::ZUsd).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidResult(_)));

    let mut last = None;
    while let Ok(event) = events.try_recv() {
        last = Some(event.kind);
    }
    assert!(matches!(last, Some(EventKind::Failed { .. })));
}

#[tokio::test]
async fn overlapping_reveals_are_refused() {
    let devnet = devnet();
    let owner = owner_client(&devnet);
    let (wallet, client) = user_client(&devnet);
    owner
        .mint(&TokenSymbol::ZUsd, wallet.address(), 1)
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        client.reveal_balance(&TokenSymbol::ZUsd),
        client.reveal_balance(&TokenSymbol::ZUsd),
    );
    assert!(matches!(first.unwrap(), RevealOutcome::Decrypted(_)));
    assert!(matches!(
        second.unwrap_err(),
        EngineError::HandshakeInProgress { .. }
    ));
    assert_eq!(wallet.prompts(), 1);
}

#[tokio::test]
async fn reveal_reports_handshake_steps_in_order() {
    let devnet = devnet();
    let owner = owner_client(&devnet);
    let (wallet, client) = user_client(&devnet);
    owner
        .mint(&TokenSymbol::ZBtc, wallet.address(), 2)
        .await
        .unwrap();
    let mut events = client.subscribe();

    client.reveal_balance(&TokenSymbol::ZBtc).await.unwrap();

    let mut steps = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let EventKind::Progress { step } = event.kind {
            steps.push(step);
        }
    }
    assert_eq!(
        steps,
        [
            "fetching_balance",
            "balance_fetched",
            "disclosing",
            "awaiting_disclosure_confirm",
            "disclosed",
            "generating_keypair",
            "constructing_consent",
            "awaiting_signature",
            "requesting_decryption",
            "decrypted",
        ]
    );
}

#[tokio::test]
async fn network_switch_mid_reveal_is_abandoned() {
    let devnet = devnet();
    let owner = owner_client(&devnet);
    let (wallet, client) = user_client(&devnet);
    owner
        .mint(&TokenSymbol::ZUsd, wallet.address(), 1)
        .await
        .unwrap();

    // Switch as soon as the handshake has broadcast its disclosure.
    let mut events = client.subscribe();
    let switcher = Arc::clone(&client);
    let watcher = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if matches!(event.kind, EventKind::Submitted { .. }) {
                switcher.switch_network(common::OTHER_NETWORK);
                break;
            }
        }
    });

    let outcome = client.reveal_balance(&TokenSymbol::ZUsd).await.unwrap();
    watcher.await.unwrap();
    assert_eq!(outcome, RevealOutcome::Abandoned);
    assert_eq!(wallet.prompts(), 0);
    assert_eq!(devnet.oracle().requests(), 0);
}

#[tokio::test]
async fn revealing_for_another_account_is_refused() {
    let devnet = devnet();
    let (_, client) = user_client(&devnet);
    let err = client
        .disclosure()
        .reveal(addr(0x42), &TokenSymbol::ZUsd)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AccountMismatch { .. }));
}
