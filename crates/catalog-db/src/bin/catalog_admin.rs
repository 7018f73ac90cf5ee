//! # Catalog Admin
//!
//! Operator tool for the relational catalog database.
//!
//! ## Usage
//! ```bash
//! # Apply embedded migrations (default action)
//! cargo run -p catalog-db --bin catalog-admin -- --action migrate --db ./catalog.db
//!
//! # Verify the database answers and report migration state
//! cargo run -p catalog-db --bin catalog-admin -- --action check
//!
//! # Insert a small demo catalog (skipped when products already exist)
//! cargo run -p catalog-db --bin catalog-admin -- --action seed
//! ```
//!
//! ## Demo Catalog
//! Two departments, a three-level category tree, and a dozen products
//! with a mix of stock levels, sale flags and brands.

use std::env;
use std::time::Instant;

use anyhow::{bail, Context};
use catalog_core::{
    Category, CreateCategoryRequest, CreateDepartmentRequest, CreateProductRequest, Dimensions,
    Money,
};
use catalog_db::{migrations, CatalogRepository, Database, DbConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_DB_PATH: &str = "./catalog.db";

/// Demo products: (department slug, category slug, sku, name, brand, cents, stock, on sale)
const PRODUCTS: &[(&str, &str, &str, &str, &str, i64, i64, bool)] = &[
    ("grocery", "milk", "MLK-WHL-1L", "Whole Milk 1L", "Farmland", 189, 40, false),
    ("grocery", "milk", "MLK-SKM-1L", "Skim Milk 1L", "Farmland", 179, 3, true),
    ("grocery", "milk", "MLK-OAT-1L", "Oat Milk 1L", "Oatly", 329, 12, false),
    ("grocery", "cheese", "CHS-CHD-200", "Cheddar 200g", "Tillamook", 499, 0, false),
    ("grocery", "cheese", "CHS-MOZ-125", "Mozzarella 125g", "Galbani", 259, 18, true),
    ("grocery", "bakery", "BRD-WHT-800", "White Bread 800g", "Wonder", 249, 25, false),
    ("grocery", "bakery", "BRD-SRD-500", "Sourdough 500g", "Local Bakery", 549, 4, false),
    ("hardware", "hand-tools", "TLS-HAM-16", "Claw Hammer 16oz", "Stanley", 1899, 9, false),
    ("hardware", "hand-tools", "TLS-SCR-SET", "Screwdriver Set", "Stanley", 2499, 2, true),
    ("hardware", "hand-tools", "TLS-TAPE-5M", "Tape Measure 5m", "Komelon", 999, 30, false),
    ("hardware", "fasteners", "FST-NAIL-100", "Nails 100pk", "Grip-Rite", 399, 150, false),
    ("hardware", "fasteners", "FST-SCRW-50", "Wood Screws 50pk", "Spax", 649, 0, true),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Migrate,
    Check,
    Seed,
}

impl Action {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "migrate" => Some(Action::Migrate),
            "check" => Some(Action::Check),
            "seed" => Some(Action::Seed),
            _ => None,
        }
    }
}

fn print_help() {
    println!("Catalog Admin");
    println!();
    println!("Usage: catalog-admin [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -a, --action <ACTION>  migrate | check | seed (default: migrate)");
    println!("  -d, --db <PATH>        Database file path (default: {DEFAULT_DB_PATH})");
    println!("  -h, --help             Show this help message");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut action = Action::Migrate;
    let mut db_path = env::var("CATALOG_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--action" | "-a" => {
                let Some(value) = args.get(i + 1) else {
                    bail!("--action needs a value");
                };
                action = match Action::parse(value) {
                    Some(action) => action,
                    None => {
                        error!(action = %value, "Unknown action (available: migrate, check, seed)");
                        std::process::exit(1);
                    }
                };
                i += 1;
            }
            "--db" | "-d" => {
                if let Some(value) = args.get(i + 1) {
                    db_path = value.clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    info!(db = %db_path, action = ?action, "Catalog admin starting");

    match action {
        Action::Migrate => {
            let db = Database::new(DbConfig::new(&db_path).run_migrations(false))
                .await
                .context("failed to open database")?;
            db.run_migrations().await.context("migration failed")?;
            let (total, applied) = migrations::migration_status(db.pool()).await?;
            info!(total, applied, "All migrations completed successfully");
        }
        Action::Check => {
            let db = Database::new(DbConfig::new(&db_path).run_migrations(false))
                .await
                .context("database connection failed")?;
            if !db.health_check().await {
                bail!("database did not answer the health query");
            }
            let (total, applied) = migrations::migration_status(db.pool()).await?;
            if applied < total {
                warn!(total, applied, "Database has pending migrations");
            }
            info!(total, applied, "Database connection OK");
        }
        Action::Seed => {
            let db = Database::new(DbConfig::new(&db_path))
                .await
                .context("failed to open database")?;
            seed(&db).await?;
        }
    }

    Ok(())
}

async fn seed(db: &Database) -> anyhow::Result<()> {
    let catalog = db.catalog();

    let existing = catalog.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        return Ok(());
    }

    let start = Instant::now();

    let mut departments = Vec::new();
    for (name, slug, icon) in [("Grocery", "grocery", "🛒"), ("Hardware", "hardware", "🔨")] {
        let department = catalog
            .create_department(CreateDepartmentRequest {
                name: name.into(),
                slug: slug.into(),
                icon: icon.into(),
                description: format!("{name} department"),
                ..Default::default()
            })
            .await?;
        departments.push(department);
    }

    // (name, slug, parent slug)
    let tree = [
        ("Food", "food", None),
        ("Dairy", "dairy", Some("food")),
        ("Milk", "milk", Some("dairy")),
        ("Cheese", "cheese", Some("dairy")),
        ("Bakery", "bakery", Some("food")),
        ("Tools", "tools", None),
        ("Hand Tools", "hand-tools", Some("tools")),
        ("Fasteners", "fasteners", Some("tools")),
    ];
    let mut categories: Vec<Category> = Vec::new();
    for (name, slug, parent) in tree {
        let parent_id = parent.and_then(|p| {
            categories
                .iter()
                .find(|c| c.slug == p)
                .map(|c| c.id.clone())
        });
        let category = catalog
            .create_category(CreateCategoryRequest {
                name: name.into(),
                slug: slug.into(),
                parent_id,
                ..Default::default()
            })
            .await?;
        categories.push(category);
    }

    let mut generated = 0;
    for (department, category, sku, name, brand, cents, stock, on_sale) in PRODUCTS {
        let department_id = departments
            .iter()
            .find(|d| d.slug == *department)
            .map(|d| d.id.clone())
            .context("unknown demo department")?;
        let category_id = categories
            .iter()
            .find(|c| c.slug == *category)
            .map(|c| c.id.clone())
            .context("unknown demo category")?;

        let request = CreateProductRequest {
            name: name.to_string(),
            description: format!("{name} by {brand}"),
            sku: sku.to_string(),
            slug: sku.to_lowercase(),
            price: Money::from_cents(*cents),
            original_price: on_sale.then(|| Money::from_cents(cents + cents / 5)),
            department_id,
            category_id,
            brand: brand.to_string(),
            unit: "each".into(),
            stock: *stock,
            min_stock: 5,
            weight: 0.5,
            weight_unit: "kg".into(),
            dimensions: Dimensions {
                length: 10.0,
                width: 5.0,
                height: 20.0,
            },
            is_on_sale: *on_sale,
            discount: on_sale.then_some(20.0),
            ..Default::default()
        };

        match catalog.create_product(request).await {
            Ok(_) => generated += 1,
            Err(e) => error!(sku = %sku, error = %e, "Failed to insert product"),
        }
    }

    let low_stock = catalog.list_low_stock().await?;
    info!(
        departments = departments.len(),
        categories = categories.len(),
        products = generated,
        low_stock = low_stock.len(),
        elapsed = ?start.elapsed(),
        "Seed complete"
    );

    Ok(())
}
