//! Cart persistence.
//!
//! A cart is stored as `cart_items` rows plus an optional `cart_promos` row.
//! Lines are read back with the product's current name and prices, so a
//! cart is always priced the way checkout will charge it.
//! Callers mutate a [`Cart`] in memory and write it back with
//! [`CartRepository::save`], which is the only code path that writes cart
//! rows.

use std::collections::BTreeMap;

use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use lumiere_core::{Cart, CartLine, Money, ProductId, PromoCode, Quantity, UserId};

use super::RepositoryError;

#[derive(sqlx::FromRow)]
struct CartItemRow {
    product_id: ProductId,
    name: String,
    unit_price: Money,
    original_price: Option<Money>,
    quantity: i32,
    attributes: Json<BTreeMap<String, String>>,
}

impl TryFrom<CartItemRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        let quantity = Quantity::clamped(i64::from(row.quantity)).ok_or_else(|| {
            RepositoryError::DataCorruption(format!(
                "cart line for product {} has quantity {}",
                row.product_id, row.quantity
            ))
        })?;

        Ok(Self {
            product_id: row.product_id,
            name: row.name,
            unit_price: row.unit_price,
            original_price: row.original_price,
            quantity,
            attributes: row.attributes.0,
        })
    }
}

/// Repository for server-side carts.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Read a user's cart without locking.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn load(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_cart(&mut conn, user_id, false).await
    }

    /// Lock and read a user's cart inside a transaction.
    ///
    /// The user row is locked first so that concurrent requests for the same
    /// user queue up even while the cart has no rows to lock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn load_for_update(
        conn: &mut PgConnection,
        user_id: UserId,
    ) -> Result<Cart, RepositoryError> {
        let locked: Option<i32> =
            sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR NO KEY UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *conn)
                .await?;
        if locked.is_none() {
            return Err(RepositoryError::NotFound);
        }

        load_cart(conn, user_id, true).await
    }

    /// Replace the stored cart with `cart`.
    ///
    /// Run this inside the same transaction as [`Self::load_for_update`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a write fails.
    pub async fn save(
        conn: &mut PgConnection,
        user_id: UserId,
        cart: &Cart,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        if !cart.is_empty() {
            insert_lines(user_id, cart.lines())
                .build()
                .execute(&mut *conn)
                .await?;
        }

        match cart.promo() {
            Some(promo) => {
                sqlx::query(
                    "INSERT INTO cart_promos (user_id, code) VALUES ($1, $2) \
                     ON CONFLICT (user_id) DO UPDATE SET code = EXCLUDED.code, applied_at = NOW()",
                )
                .bind(user_id)
                .bind(promo.code())
                .execute(&mut *conn)
                .await?;
            }
            None => {
                sqlx::query("DELETE FROM cart_promos WHERE user_id = $1")
                    .bind(user_id)
                    .execute(&mut *conn)
                    .await?;
            }
        }

        Ok(())
    }
}

async fn load_cart(
    conn: &mut PgConnection,
    user_id: UserId,
    lock: bool,
) -> Result<Cart, RepositoryError> {
    let rows = sqlx::query_as::<_, CartItemRow>(&select_lines(lock))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
    let lines = rows
        .into_iter()
        .map(CartLine::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    let code: Option<String> = sqlx::query_scalar("SELECT code FROM cart_promos WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    // A code dropped from the table since it was applied simply stops applying
    let promo = code.and_then(|code| match PromoCode::lookup(&code) {
        Ok(promo) => Some(promo),
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "Ignoring stored promo code");
            None
        }
    });

    Ok(Cart::from_parts(lines, promo))
}

/// Cart lines with the product's current name and prices.
fn select_lines(lock: bool) -> String {
    let mut sql = String::from(
        "SELECT ci.product_id, p.name, p.price AS unit_price, p.original_price, \
                ci.quantity, ci.attributes \
         FROM cart_items ci \
         JOIN products p ON p.id = ci.product_id \
         WHERE ci.user_id = $1 \
         ORDER BY ci.position",
    );
    if lock {
        sql.push_str(" FOR UPDATE OF ci");
    }

    sql
}

fn insert_lines(user_id: UserId, lines: &[CartLine]) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "INSERT INTO cart_items \
         (user_id, product_id, position, name, unit_price, original_price, quantity, attributes) ",
    );
    builder.push_values(lines.iter().zip(0_i32..), |mut row, (line, position)| {
        row.push_bind(user_id)
            .push_bind(line.product_id)
            .push_bind(position)
            .push_bind(line.name.clone())
            .push_bind(line.unit_price)
            .push_bind(line.original_price)
            .push_bind(i32::from(line.quantity))
            .push_bind(Json(line.attributes.clone()));
    });
    builder
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i32, quantity: i64) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            name: format!("Product {id}"),
            unit_price: Money::from_units(100),
            original_price: None,
            quantity: Quantity::clamped(quantity).unwrap(),
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn test_insert_lines_sql() {
        let sql = insert_lines(UserId::new(1), &[line(1, 2), line(2, 1)]).into_sql();
        assert!(sql.starts_with("INSERT INTO cart_items"));
        assert!(sql.contains("VALUES ($1, $2, $3, $4, $5, $6, $7, $8), ($9, $10"));
        assert!(sql.ends_with("$16)"));
    }

    #[test]
    fn test_lines_priced_from_catalog() {
        let sql = select_lines(false);
        assert!(sql.contains("p.price AS unit_price"));
        assert!(sql.contains("JOIN products p ON p.id = ci.product_id"));
        assert!(!sql.contains("FOR UPDATE"));
        assert!(select_lines(true).ends_with("FOR UPDATE OF ci"));
    }

    #[test]
    fn test_row_with_bad_quantity_is_corruption() {
        let row = CartItemRow {
            product_id: ProductId::new(3),
            name: "Balm".to_owned(),
            unit_price: Money::from_units(10),
            original_price: None,
            quantity: 0,
            attributes: Json(BTreeMap::new()),
        };
        assert!(matches!(
            CartLine::try_from(row),
            Err(RepositoryError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_row_quantity_above_cap_is_clamped() {
        let row = CartItemRow {
            product_id: ProductId::new(3),
            name: "Balm".to_owned(),
            unit_price: Money::from_units(10),
            original_price: None,
            quantity: 120,
            attributes: Json(BTreeMap::new()),
        };
        assert_eq!(CartLine::try_from(row).unwrap().quantity, Quantity::MAX);
    }
}
