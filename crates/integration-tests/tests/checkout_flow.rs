//! End-to-end checkout flows against in-memory services.

use medcart_core::cart::{OrderMode, ProductPricing};
use medcart_core::tax::{QuoteDisposition, TaxState};
use medcart_core::types::{CustomerId, Money, ProductId, VariantId};

use medcart_checkout::CheckoutError;
use medcart_checkout::services::address::Address;
use medcart_checkout::services::payment::CardDetails;
use medcart_checkout::services::tax::{TaxError, calculate_with_retry};
use medcart_checkout::session::{CheckoutSession, SubmissionState};

use medcart_integration_tests::{
    DownTax, FakeGateway, FakeOrders, FakeTax, FakeTokenizer, init_tracing,
};

fn test_card() -> CardDetails {
    CardDetails {
        card_number: "4242424242424242".into(),
        expiry_month: 12,
        expiry_year: 2030,
        cvv: "123".into(),
    }
}

fn test_address() -> Address {
    Address {
        street1: "450 Sutter St".to_string(),
        city: "San Francisco".to_string(),
        state: "CA".to_string(),
        postal_code: "94108".to_string(),
    }
}

fn flat_pricing(cents: u64) -> ProductPricing {
    ProductPricing {
        base_price: Money::from_cents(cents),
        custom_price: Some(Money::from_cents(cents)),
        has_price_history: true,
        latest_marked_up_price: Some(Money::from_cents(cents)),
    }
}

/// Hydrate a customer session holding one $100.00 line.
async fn session_with_hundred_dollar_cart(orders: &FakeOrders) -> CheckoutSession {
    let mut session = CheckoutSession::new(OrderMode::Customer);
    session.hydrate(orders).await.expect("hydrate");
    session
        .add_product(
            ProductId::new("p1"),
            VariantId::new("v1"),
            "Omega-3",
            1,
            flat_pricing(10_000),
            false,
        )
        .expect("add product");
    session.set_customer(Some(CustomerId::new("cust_1")));
    session
}

#[tokio::test(start_paused = true)]
async fn customer_checkout_happy_path() {
    init_tracing();
    let orders = FakeOrders::default();
    let tax = FakeTax::default(); // quotes 8.75
    let tokenizer = FakeTokenizer::default();
    let gateway = FakeGateway::default();

    let mut session = session_with_hundred_dollar_cart(&orders).await;

    let ticket = session.set_postal_code("90210").expect("quotable postal");
    let result = calculate_with_retry(&tax, ticket.subtotal, &ticket.postal_code).await;
    assert_eq!(
        session.apply_tax_result(&ticket, result),
        QuoteDisposition::Applied
    );
    let TaxState::Quoted(quote) = session.tax_state() else {
        panic!("expected a quote");
    };
    assert_eq!(quote.total, Money::from_cents(10_875));

    let order_id = session
        .submit(
            &orders,
            &tokenizer,
            &gateway,
            &test_card(),
            test_address(),
            test_address(),
        )
        .await
        .expect("submission");

    let submissions = gateway.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].order_id, order_id);
    assert_eq!(submissions[0].amount, Money::from_cents(10_875));
    assert_eq!(submissions[0].tax_amount, Money::from_cents(875));
    assert_eq!(submissions[0].opaque_data.data_value, "tok_test");

    let drafts = orders.created_orders();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].lines.len(), 1);
    assert_eq!(drafts[0].customer_id, Some(CustomerId::new("cust_1")));

    // the cart commits (clears) only on success, and the session is spent
    assert!(session.cart().lines().is_empty());
    assert_eq!(
        session.submission_state(),
        &SubmissionState::Completed(order_id)
    );
    let err = session
        .submit(
            &orders,
            &tokenizer,
            &gateway,
            &test_card(),
            test_address(),
            test_address(),
        )
        .await
        .expect_err("second submit must be rejected");
    assert!(matches!(err, CheckoutError::AlreadySubmitted));
    assert_eq!(gateway.submissions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn tax_retries_transient_failures_then_succeeds() {
    init_tracing();
    let tax = FakeTax::with_script(vec![
        Err(TaxError::Api {
            status: 503,
            message: "upstream timeout".to_string(),
        }),
        Err(TaxError::Api {
            status: 502,
            message: "bad gateway".to_string(),
        }),
    ]);

    let breakdown = calculate_with_retry(&tax, Money::from_cents(10_000), "90210")
        .await
        .expect("third attempt succeeds");
    assert_eq!(breakdown.tax_amount, Money::from_cents(875));
    assert_eq!(tax.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn tax_exhaustion_without_fallback_blocks_checkout() {
    init_tracing();
    let orders = FakeOrders::default();
    let tax = DownTax::default();

    let mut session = session_with_hundred_dollar_cart(&orders).await;
    let ticket = session.set_postal_code("90210").expect("quotable postal");

    let result = calculate_with_retry(&tax, ticket.subtotal, &ticket.postal_code).await;
    assert!(matches!(result, Err(TaxError::Unavailable)));
    // one initial attempt plus two retries
    assert_eq!(tax.call_count(), 3);

    session.apply_tax_result(&ticket, result);
    assert_eq!(session.tax_state(), &TaxState::Failed { fallback: None });

    let err = session
        .submit(
            &orders,
            &FakeTokenizer::default(),
            &FakeGateway::default(),
            &test_card(),
            test_address(),
            test_address(),
        )
        .await
        .expect_err("no usable tax");
    assert!(matches!(err, CheckoutError::TaxUnavailable));
}

#[tokio::test(start_paused = true)]
async fn tax_exhaustion_with_fallback_proceeds_on_last_known_figure() {
    init_tracing();
    let orders = FakeOrders::default();
    let gateway = FakeGateway::default();

    let mut session =
        CheckoutSession::with_last_known_tax(OrderMode::Customer, Money::from_cents(710));
    session.hydrate(&orders).await.expect("hydrate");
    session
        .add_product(
            ProductId::new("p1"),
            VariantId::new("v1"),
            "Omega-3",
            1,
            flat_pricing(10_000),
            false,
        )
        .expect("add product");
    session.set_customer(Some(CustomerId::new("cust_1")));

    let ticket = session.set_postal_code("90210").expect("quotable postal");
    let result = calculate_with_retry(&DownTax::default(), ticket.subtotal, &ticket.postal_code).await;
    session.apply_tax_result(&ticket, result);
    assert_eq!(
        session.tax_state(),
        &TaxState::Failed {
            fallback: Some(Money::from_cents(710))
        }
    );

    session
        .submit(
            &orders,
            &FakeTokenizer::default(),
            &gateway,
            &test_card(),
            test_address(),
            test_address(),
        )
        .await
        .expect("fallback tax allows submission");

    let submissions = gateway.submissions();
    assert_eq!(submissions[0].tax_amount, Money::from_cents(710));
    assert_eq!(submissions[0].amount, Money::from_cents(10_710));
}

#[tokio::test(start_paused = true)]
async fn payment_decline_leaves_cart_intact_and_retryable() {
    init_tracing();
    let orders = FakeOrders::default();
    let tax = FakeTax::default();
    let tokenizer = FakeTokenizer::default();
    let gateway = FakeGateway::default();
    gateway.set_decline(true);

    let mut session = session_with_hundred_dollar_cart(&orders).await;
    let ticket = session.set_postal_code("90210").expect("quotable postal");
    let result = calculate_with_retry(&tax, ticket.subtotal, &ticket.postal_code).await;
    session.apply_tax_result(&ticket, result);

    let err = session
        .submit(
            &orders,
            &tokenizer,
            &gateway,
            &test_card(),
            test_address(),
            test_address(),
        )
        .await
        .expect_err("declined");
    assert!(matches!(err, CheckoutError::Payment(_)));

    // nothing was cleared, and the session can try again
    assert_eq!(session.cart().lines().len(), 1);
    assert_eq!(session.submission_state(), &SubmissionState::Idle);

    gateway.set_decline(false);
    session
        .submit(
            &orders,
            &tokenizer,
            &gateway,
            &test_card(),
            test_address(),
            test_address(),
        )
        .await
        .expect("retry succeeds");
    assert!(session.cart().lines().is_empty());
}

#[tokio::test(start_paused = true)]
async fn tokenization_failure_aborts_before_payment() {
    init_tracing();
    let orders = FakeOrders::default();
    let gateway = FakeGateway::default();
    let tokenizer = FakeTokenizer { fail: true };

    let mut session = session_with_hundred_dollar_cart(&orders).await;
    let ticket = session.set_postal_code("90210").expect("quotable postal");
    let result = calculate_with_retry(&FakeTax::default(), ticket.subtotal, &ticket.postal_code).await;
    session.apply_tax_result(&ticket, result);

    let err = session
        .submit(
            &orders,
            &tokenizer,
            &gateway,
            &test_card(),
            test_address(),
            test_address(),
        )
        .await
        .expect_err("tokenization fails");
    assert!(matches!(err, CheckoutError::Tokenization(_)));

    // no payment request ever left the client
    assert!(gateway.submissions().is_empty());
    assert_eq!(session.cart().lines().len(), 1);
    assert_eq!(session.submission_state(), &SubmissionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn out_of_band_price_blocks_submission_until_fixed() {
    init_tracing();
    let orders = FakeOrders::default();
    let tax = FakeTax::default();
    let gateway = FakeGateway::default();

    let mut session = CheckoutSession::new(OrderMode::Customer);
    session.hydrate(&orders).await.expect("hydrate");
    session
        .add_product(
            ProductId::new("p1"),
            VariantId::new("v1"),
            "Collagen",
            1,
            ProductPricing {
                base_price: Money::from_cents(5000),
                custom_price: Some(Money::from_cents(7500)),
                has_price_history: true,
                latest_marked_up_price: Some(Money::from_cents(7500)),
            },
            false,
        )
        .expect("add product");
    session.set_customer(Some(CustomerId::new("cust_1")));

    // price below the original price
    session
        .edit_price(&ProductId::new("p1"), Money::from_cents(4000))
        .expect("edit price");
    let ticket = session.set_postal_code("90210").expect("quotable postal");
    let result = calculate_with_retry(&tax, ticket.subtotal, &ticket.postal_code).await;
    session.apply_tax_result(&ticket, result);

    let err = session
        .submit(
            &orders,
            &FakeTokenizer::default(),
            &gateway,
            &test_card(),
            test_address(),
            test_address(),
        )
        .await
        .expect_err("price below floor");
    let CheckoutError::Validation(failures) = err else {
        panic!("expected validation failure");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, ProductId::new("p1"));

    // back inside the band, the order goes through
    let ticket = session
        .edit_price(&ProductId::new("p1"), Money::from_cents(6000))
        .expect("edit price")
        .expect("re-quote");
    let result = calculate_with_retry(&tax, ticket.subtotal, &ticket.postal_code).await;
    session.apply_tax_result(&ticket, result);
    session
        .submit(
            &orders,
            &FakeTokenizer::default(),
            &gateway,
            &test_card(),
            test_address(),
            test_address(),
        )
        .await
        .expect("valid cart submits");
}

#[tokio::test(start_paused = true)]
async fn customer_order_requires_a_customer() {
    init_tracing();
    let orders = FakeOrders::default();
    let mut session = session_with_hundred_dollar_cart(&orders).await;
    session.set_customer(None);

    let ticket = session.set_postal_code("90210").expect("quotable postal");
    let result = calculate_with_retry(&FakeTax::default(), ticket.subtotal, &ticket.postal_code).await;
    session.apply_tax_result(&ticket, result);

    let err = session
        .submit(
            &orders,
            &FakeTokenizer::default(),
            &FakeGateway::default(),
            &test_card(),
            test_address(),
            test_address(),
        )
        .await
        .expect_err("no customer selected");
    assert!(matches!(err, CheckoutError::CustomerRequired));
}
