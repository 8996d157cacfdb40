//! Cart and checkout integration tests.
//!
//! These tests require a scratch `PostgreSQL` database in `TEST_DATABASE_URL`.
//!
//! Run with: cargo test -p lumiere-integration-tests -- --ignored

use std::collections::BTreeMap;

use lumiere_core::{Money, UserId};
use lumiere_integration_tests::TestContext;
use lumiere_storefront::db::ProductRepository;
use lumiere_storefront::db::products::ProductPatch;
use lumiere_storefront::models::OrderItem;
use lumiere_storefront::services::cart::{CartError, CartService};
use lumiere_storefront::services::orders::{Checkout, OrderError, OrderService};

const ADDRESS: &str = "Санкт-Петербург, Невский пр., 28";

fn checkout() -> Checkout<'static> {
    Checkout {
        shipping_address: ADDRESS,
        ..Checkout::default()
    }
}

async fn order_count(ctx: &TestContext, user_id: UserId) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&ctx.pool)
        .await
        .expect("count orders")
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_empty_cart_order_creates_nothing() {
    let ctx = TestContext::new().await;
    let user = ctx.user().await.user;

    let result = OrderService::new(&ctx.pool).place(user.id, &checkout()).await;

    assert!(matches!(result, Err(OrderError::EmptyCart)));
    assert_eq!(order_count(&ctx, user.id).await, 0);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_quantity_clamped_and_persisted() {
    let ctx = TestContext::new().await;
    let user = ctx.user().await.user;
    let product = ctx.product(450).await;
    let carts = CartService::new(&ctx.pool);

    let view = carts
        .add(user.id, product.id, 150, BTreeMap::new())
        .await
        .expect("add");
    assert_eq!(view.item_count, 99);

    // Adding more never pushes a line past the cap
    carts.add(user.id, product.id, 5, BTreeMap::new()).await.expect("add again");

    let reloaded = carts.view(user.id).await.expect("view");
    assert_eq!(reloaded.items.len(), 1);
    assert_eq!(reloaded.items[0].quantity.get(), 99);

    let lowered = carts.set_quantity(user.id, product.id, 3).await.expect("set");
    assert_eq!(lowered.item_count, 3);

    let removed = carts.set_quantity(user.id, product.id, 0).await.expect("set zero");
    assert!(removed.items.is_empty());
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_out_of_stock_cannot_be_added() {
    let ctx = TestContext::new().await;
    let user = ctx.user().await.user;
    let product = ctx.product(990).await;

    ProductRepository::new(&ctx.pool)
        .update(
            product.id,
            &ProductPatch {
                in_stock: Some(false),
                ..ProductPatch::default()
            },
        )
        .await
        .expect("mark out of stock");

    let result = CartService::new(&ctx.pool)
        .add(user.id, product.id, 1, BTreeMap::new())
        .await;
    assert!(matches!(result, Err(CartError::ProductUnavailable(id)) if id == product.id));
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_order_totals_with_promo() {
    let ctx = TestContext::new().await;
    let user = ctx.user().await.user;
    let product = ctx.product(1000).await;
    let carts = CartService::new(&ctx.pool);

    carts.add(user.id, product.id, 2, BTreeMap::new()).await.expect("add");
    let (promo, view) = carts.apply_promo(user.id, "welcome10").await.expect("promo");
    assert_eq!(promo.code(), "WELCOME10");
    assert_eq!(view.summary.discount, Money::from_units(200));

    let orders = OrderService::new(&ctx.pool);
    let placed = orders.place(user.id, &checkout()).await.expect("place order");

    assert!(placed.order_number.starts_with("ORD-"));
    assert_eq!(placed.promo_code, Some("WELCOME10"));
    assert_eq!(placed.summary.subtotal, Money::from_units(2000));
    assert_eq!(placed.summary.discount, Money::from_units(200));
    assert_eq!(placed.summary.shipping, Money::from_units(300));
    assert_eq!(placed.summary.total, Money::from_units(2100));

    let detail = orders.detail(user.id, placed.id).await.expect("detail");
    assert_eq!(detail.order.total_amount, Money::from_units(2000));
    assert_eq!(detail.order.grand_total, Money::from_units(2100));
    assert_eq!(detail.order.shipping_address, ADDRESS);
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].quantity, 2);
    let line_sum: Money = detail.items.iter().map(OrderItem::line_total).sum();
    assert_eq!(line_sum, detail.order.total_amount);

    let history = orders.history(user.id, None).await.expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].items_count, 2);

    // Cart and promo are cleared with the order
    let after = carts.view(user.id).await.expect("view");
    assert!(after.items.is_empty());
    assert!(after.promo.is_none());
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_cart_and_order_use_current_catalog_price() {
    let ctx = TestContext::new().await;
    let user = ctx.user().await.user;
    let product = ctx.product(4000).await;

    CartService::new(&ctx.pool)
        .add(user.id, product.id, 1, BTreeMap::new())
        .await
        .expect("add");

    ProductRepository::new(&ctx.pool)
        .update(
            product.id,
            &ProductPatch {
                price: Some(Money::from_units(2500)),
                ..ProductPatch::default()
            },
        )
        .await
        .expect("reprice");

    // The cart already shows the new price
    let view = CartService::new(&ctx.pool).view(user.id).await.expect("view");
    assert_eq!(view.items[0].unit_price, Money::from_units(2500));

    let placed = OrderService::new(&ctx.pool)
        .place(user.id, &checkout())
        .await
        .expect("place order");

    assert_eq!(placed.summary.subtotal, Money::from_units(2500));
    assert_eq!(placed.summary.shipping, Money::from_units(300));
    assert_eq!(view.summary, placed.summary);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_unavailable_product_aborts_checkout() {
    let ctx = TestContext::new().await;
    let user = ctx.user().await.user;
    let product = ctx.product(700).await;
    let carts = CartService::new(&ctx.pool);

    carts.add(user.id, product.id, 1, BTreeMap::new()).await.expect("add");
    ProductRepository::new(&ctx.pool)
        .update(
            product.id,
            &ProductPatch {
                in_stock: Some(false),
                ..ProductPatch::default()
            },
        )
        .await
        .expect("mark out of stock");

    let result = OrderService::new(&ctx.pool).place(user.id, &checkout()).await;
    assert!(matches!(result, Err(OrderError::ProductUnavailable(id)) if id == product.id));

    // Nothing committed: no order and the cart is untouched
    assert_eq!(order_count(&ctx, user.id).await, 0);
    assert_eq!(carts.view(user.id).await.expect("view").item_count, 1);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_other_users_order_is_not_found() {
    let ctx = TestContext::new().await;
    let owner = ctx.user().await.user;
    let stranger = ctx.user().await.user;
    let product = ctx.product(3500).await;

    CartService::new(&ctx.pool)
        .add(owner.id, product.id, 1, BTreeMap::new())
        .await
        .expect("add");
    let placed = OrderService::new(&ctx.pool)
        .place(owner.id, &checkout())
        .await
        .expect("place order");

    // Above the free-shipping threshold
    assert_eq!(placed.summary.shipping, Money::ZERO);

    let result = OrderService::new(&ctx.pool).detail(stranger.id, placed.id).await;
    assert!(matches!(result, Err(OrderError::NotFound)));
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_expensive_order_fits() {
    let ctx = TestContext::new().await;
    let user = ctx.user().await.user;
    let product = ctx.product(50_000_000).await;

    CartService::new(&ctx.pool)
        .add(user.id, product.id, 3, BTreeMap::new())
        .await
        .expect("add");

    let placed = OrderService::new(&ctx.pool)
        .place(user.id, &checkout())
        .await
        .expect("place order");

    assert_eq!(placed.summary.total, Money::from_units(150_000_000));
    let detail = OrderService::new(&ctx.pool)
        .detail(user.id, placed.id)
        .await
        .expect("detail");
    assert_eq!(detail.order.grand_total, Money::from_units(150_000_000));
}
