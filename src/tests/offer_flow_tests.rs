//! Offer flows: make, cancel, accept

use solana_sdk::pubkey::Pubkey;

use super::test_helpers::*;
use crate::market::MarketError;
use crate::resolver::associated_account;

#[tokio::test]
async fn test_make_offer_in_sol_creates_currency_and_escrow_accounts() {
    let fx = Fixture::new();
    let buyer = Pubkey::new_unique();
    let mint = Pubkey::new_unique();

    let bundle = fx
        .client
        .make_offer(&buyer, &mint, ONE_SOL as i64, false)
        .await
        .unwrap();

    let escrow = fx.client.addresses().escrow_vault().unwrap().address;
    let created: Vec<Pubkey> = bundle.bootstrap().iter().map(created_address).collect();
    assert_eq!(created, vec![fx.currency_account(&buyer), fx.currency_account(&escrow)]);

    let ix = bundle.operation_instruction().unwrap();
    assert_eq!(
        ix.accounts[2].pubkey,
        fx.client.addresses().offer_data(&mint, &buyer).unwrap().address
    );
    let price = u64::from_le_bytes(ix.data[12..20].try_into().unwrap());
    let by_token = u64::from_le_bytes(ix.data[20..28].try_into().unwrap());
    assert_eq!(price, ONE_SOL);
    assert_eq!(by_token, 0);
}

#[tokio::test]
async fn test_make_offer_in_token_needs_existing_account() {
    let fx = Fixture::new();
    let buyer = Pubkey::new_unique();
    let result = fx
        .client
        .make_offer(&buyer, &Pubkey::new_unique(), 5, true)
        .await;
    assert!(matches!(result, Err(MarketError::MissingTokenAccount { .. })));
}

#[tokio::test]
async fn test_cancel_offer_needs_no_ledger() {
    let fx = Fixture::new();
    let buyer = Pubkey::new_unique();
    let mint = Pubkey::new_unique();
    let bundle = fx.client.cancel_offer(&buyer, &mint).await.unwrap();
    assert_eq!(bundle.instructions.len(), 1);
    assert_eq!(fx.ledger.call_count().await, 0);
}

#[tokio::test]
async fn test_accept_offer_recovers_seller_from_listing() {
    let fx = Fixture::new();
    let seller = Pubkey::new_unique();
    let buyer = Pubkey::new_unique();
    let mint = Pubkey::new_unique();
    let treasury = Pubkey::new_unique();

    fx.put_listing(&listing(mint, seller, ONE_SOL, true)).await;
    fx.put_offer(&offer(mint, buyer, ONE_SOL / 2, false)).await;
    fx.give_currency_account(&seller).await;

    let bundle = fx
        .client
        .accept_offer(&mint, &buyer, &[treasury])
        .await
        .unwrap();

    assert_eq!(bundle.payer, seller);
    assert_eq!(bundle.required_signers(), vec![seller]);
    let created: Vec<Pubkey> = bundle.bootstrap().iter().map(created_address).collect();
    assert_eq!(created, vec![associated_account(&buyer, &mint)]);

    let ix = bundle.operation_instruction().unwrap();
    assert_eq!(ix.accounts[0].pubkey, seller);
    assert_eq!(ix.accounts[2].pubkey, buyer);
    assert_eq!(ix.accounts[11].pubkey, fx.currency_account(&seller));
    assert_eq!(bundle.remaining_accounts, vec![treasury]);
}

#[tokio::test]
async fn test_accept_offer_missing_records() {
    let fx = Fixture::new();
    let seller = Pubkey::new_unique();
    let buyer = Pubkey::new_unique();
    let mint = Pubkey::new_unique();

    let result = fx.client.accept_offer(&mint, &buyer, &[]).await;
    assert!(matches!(result, Err(MarketError::ListingNotFound { .. })));

    fx.put_listing(&listing(mint, seller, ONE_SOL, true)).await;
    let result = fx.client.accept_offer(&mint, &buyer, &[]).await;
    assert!(matches!(
        result,
        Err(MarketError::OfferNotFound { mint: m, buyer: b }) if m == mint && b == buyer
    ));
}

#[tokio::test]
async fn test_token_offer_converts_treasuries() {
    let fx = Fixture::new();
    let seller = Pubkey::new_unique();
    let buyer = Pubkey::new_unique();
    let mint = Pubkey::new_unique();
    let treasury = Pubkey::new_unique();

    fx.put_listing(&listing(mint, seller, ONE_SOL, true)).await;
    fx.put_offer(&offer(mint, buyer, 700, true)).await;

    let bundle = fx
        .client
        .accept_offer(&mint, &buyer, &[treasury])
        .await
        .unwrap();
    assert_eq!(bundle.remaining_accounts, vec![fx.currency_account(&treasury)]);
}
