//! Seed the catalog from a YAML file.
//!
//! Categories are upserted by slug, so re-running a seed updates names and
//! descriptions in place. Products are inserted once: a product whose name
//! already exists in its category is skipped.
//!
//! ```yaml
//! categories:
//!   - name: Makeup
//!     slug: makeup
//!   - name: Lipstick
//!     slug: lipstick
//!     parent: makeup
//! products:
//!   - name: Velvet Matte Lipstick
//!     brand: Lumière
//!     category: lipstick
//!     price: 1290
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use lumiere_core::{CategoryId, Money};
use lumiere_storefront::db::products::NewProduct;
use lumiere_storefront::db::{self, CategoryRepository, ProductRepository};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info, warn};

use super::database_url;

/// Top-level seed document.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedFile {
    #[serde(default)]
    pub categories: Vec<SeedCategory>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedCategory {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    /// Slug of the parent category. Only one level of nesting is allowed.
    pub parent: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedProduct {
    pub name: String,
    pub brand: String,
    /// Category slug.
    pub category: String,
    pub price: Money,
    pub original_price: Option<Money>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub rating: Decimal,
    #[serde(default = "default_true")]
    pub in_stock: bool,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub is_popular: bool,
}

const fn default_true() -> bool {
    true
}

/// Totals reported after a seed run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedResult {
    pub categories: usize,
    pub products_inserted: usize,
    pub products_skipped: usize,
}

/// Check a seed file for problems that would fail halfway through a run.
///
/// Returns every problem found rather than stopping at the first.
#[must_use]
pub fn validate_seed(seed: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();
    let mut slugs = HashSet::new();
    let roots: HashSet<&str> = seed
        .categories
        .iter()
        .filter(|c| c.parent.is_none())
        .map(|c| c.slug.as_str())
        .collect();

    for category in &seed.categories {
        if category.name.trim().is_empty() {
            errors.push(format!("Category '{}' has an empty name", category.slug));
        }
        if !is_valid_slug(&category.slug) {
            errors.push(format!("Category slug '{}' must be lowercase letters, digits and '-'", category.slug));
        }
        if !slugs.insert(category.slug.as_str()) {
            errors.push(format!("Duplicate category slug '{}'", category.slug));
        }
        if let Some(parent) = &category.parent
            && !roots.contains(parent.as_str())
        {
            errors.push(format!(
                "Category '{}' has parent '{parent}', which is not a top-level category in this file",
                category.slug
            ));
        }
    }

    let mut names = HashSet::new();
    for product in &seed.products {
        if product.name.trim().is_empty() {
            errors.push("Product with an empty name".to_owned());
        }
        if product.brand.trim().is_empty() {
            errors.push(format!("Product '{}' has an empty brand", product.name));
        }
        if !slugs.contains(product.category.as_str()) {
            errors.push(format!("Product '{}' uses unknown category '{}'", product.name, product.category));
        }
        if !product.price.is_positive() {
            errors.push(format!("Product '{}' must have a positive price", product.name));
        }
        if product.original_price.is_some_and(|p| !p.is_positive()) {
            errors.push(format!("Product '{}' has a non-positive original price", product.name));
        }
        if product.rating < Decimal::ZERO || product.rating > Decimal::from(5) {
            errors.push(format!("Product '{}' rating must be between 0 and 5", product.name));
        }
        if !names.insert((product.category.as_str(), product.name.as_str())) {
            errors.push(format!("Duplicate product '{}' in category '{}'", product.name, product.category));
        }
    }

    errors
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Seed categories and products from a YAML file.
///
/// With `dry_run` the file is parsed and validated but the database is not
/// touched.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation,
/// or a database operation fails.
pub async fn run(file_path: &str, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading seed file");

    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;

    info!(
        categories = seed.categories.len(),
        products = seed.products.len(),
        "Parsed seed file"
    );

    let errors = validate_seed(&seed);
    if !errors.is_empty() {
        error!("Seed validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    if dry_run {
        info!("Seed file is valid (dry run, database untouched)");
        return Ok(());
    }

    let pool = db::create_pool(&database_url()?).await?;
    info!("Connected to database");

    let result = apply(&pool, &seed).await?;

    info!(
        categories = result.categories,
        products_inserted = result.products_inserted,
        products_skipped = result.products_skipped,
        "Seeding complete"
    );
    Ok(())
}

async fn apply(pool: &sqlx::PgPool, seed: &SeedFile) -> Result<SeedResult, Box<dyn std::error::Error>> {
    let categories = CategoryRepository::new(pool);
    let products = ProductRepository::new(pool);
    let mut result = SeedResult::default();
    let mut ids: HashMap<&str, CategoryId> = HashMap::new();

    // Parents first so children can reference their ids
    let (roots, children): (Vec<_>, Vec<_>) = seed.categories.iter().partition(|c| c.parent.is_none());
    for category in roots.into_iter().chain(children) {
        let parent_id = match &category.parent {
            Some(slug) => Some(
                *ids.get(slug.as_str())
                    .ok_or_else(|| format!("Parent '{slug}' was not seeded"))?,
            ),
            None => None,
        };
        let row = categories
            .upsert(
                &category.name,
                &category.slug,
                category.description.as_deref(),
                parent_id,
            )
            .await?;
        ids.insert(category.slug.as_str(), row.id);
        result.categories += 1;
    }

    for product in &seed.products {
        let category_id = *ids
            .get(product.category.as_str())
            .ok_or_else(|| format!("Category '{}' was not seeded", product.category))?;

        if products.find_by_name(&product.name, category_id).await?.is_some() {
            warn!(name = %product.name, category = %product.category, "Product exists, skipping");
            result.products_skipped += 1;
            continue;
        }

        products.create(&to_new_product(product, category_id)).await?;
        result.products_inserted += 1;
    }

    Ok(result)
}

fn to_new_product(product: &SeedProduct, category_id: CategoryId) -> NewProduct {
    NewProduct {
        name: product.name.trim().to_owned(),
        description: product.description.clone(),
        price: product.price.to_cents_precision(),
        original_price: product.original_price.map(|p| p.to_cents_precision()),
        image_url: product.image_url.clone(),
        category_id,
        brand: product.brand.trim().to_owned(),
        rating: product.rating,
        in_stock: product.in_stock,
        is_new: product.is_new,
        is_popular: product.is_popular,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
categories:
  - name: Makeup
    slug: makeup
  - name: Lipstick
    slug: lipstick
    parent: makeup
products:
  - name: Velvet Matte Lipstick
    brand: Lumière
    category: lipstick
    price: 1290
    original_price: 1590.00
    rating: 4.7
    is_popular: true
";

    fn parse(yaml: &str) -> SeedFile {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_sample_parses_and_validates() {
        let seed = parse(SAMPLE);
        assert_eq!(seed.categories.len(), 2);
        assert_eq!(seed.products[0].price, Money::from_units(1290));
        assert!(seed.products[0].in_stock);
        assert!(!seed.products[0].is_new);
        assert!(validate_seed(&seed).is_empty());
    }

    #[test]
    fn test_bundled_catalog_is_valid() {
        let content = include_str!("../../seed/catalog.yaml");
        let seed = parse(content);
        assert!(!seed.products.is_empty());
        assert_eq!(validate_seed(&seed), Vec::<String>::new());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<SeedFile, _> = serde_yaml::from_str("categories: []\nbrands: []\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_category_and_bad_price() {
        let seed = parse(
            r"
categories:
  - name: Skincare
    slug: skincare
products:
  - name: Night Cream
    brand: Aurora
    category: creams
    price: 0
",
        );
        let errors = validate_seed(&seed);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("unknown category 'creams'"));
        assert!(errors[1].contains("positive price"));
    }

    #[test]
    fn test_nested_too_deep() {
        let seed = parse(
            r"
categories:
  - name: Makeup
    slug: makeup
  - name: Lips
    slug: lips
    parent: makeup
  - name: Gloss
    slug: gloss
    parent: lips
",
        );
        let errors = validate_seed(&seed);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("'gloss'"));
    }

    #[test]
    fn test_duplicates_reported() {
        let seed = parse(
            r"
categories:
  - name: Hair
    slug: hair
  - name: Hair care
    slug: hair
products:
  - name: Shampoo
    brand: Nord
    category: hair
    price: 500
  - name: Shampoo
    brand: Nord
    category: hair
    price: 550
",
        );
        let errors = validate_seed(&seed);
        assert!(errors.iter().any(|e| e.starts_with("Duplicate category slug")));
        assert!(errors.iter().any(|e| e.starts_with("Duplicate product")));
    }

    #[test]
    fn test_slug_rules() {
        assert!(is_valid_slug("face-care"));
        assert!(is_valid_slug("spf50"));
        assert!(!is_valid_slug("Face"));
        assert!(!is_valid_slug("-face"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn test_rating_out_of_range() {
        let mut seed = parse(SAMPLE);
        seed.products[0].rating = Decimal::from(6);
        assert_eq!(validate_seed(&seed).len(), 1);
    }

    #[test]
    fn test_new_product_rounds_prices() {
        let mut seed = parse(SAMPLE);
        seed.products[0].price = Money::new(Decimal::new(129_999, 3));
        let new = to_new_product(&seed.products[0], CategoryId::new(4));
        assert_eq!(new.price, Money::new(Decimal::new(13000, 2)));
        assert_eq!(new.category_id, CategoryId::new(4));
        assert_eq!(new.brand, "Lumière");
    }
}
