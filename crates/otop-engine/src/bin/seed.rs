//! # Seed Data Generator
//!
//! Populates a database with demo stores and products for development.
//!
//! ## Usage
//! ```bash
//! # Seed the database named by engine.toml (or ./otop.db)
//! cargo run -p otop-engine --bin seed
//!
//! # Specify database path
//! cargo run -p otop-engine --bin seed -- ./data/otop_dev.db
//! cargo run -p otop-engine --bin seed -- --db ./data/otop_dev.db
//!
//! # Use an explicit config file
//! cargo run -p otop-engine --bin seed -- --config ./engine.toml
//! ```
//!
//! ## Generated Data
//! - One supplier per demo store
//! - Each store's goods listed in the marketplace catalog (`SP-0001`, ...)
//! - Each store's wholesale goods in its own catalog (`P-10001`, ...)
//!
//! Everything goes through the engine, so codes and ids are allocated the
//! same way they are in production.

use std::env;
use std::path::PathBuf;

use otop_core::{CatalogTable, NewOtopProduct, NewProduct, NewSupplier, Principal};
use otop_engine::{init_tracing, Engine, EngineConfig};

/// Admin id the seed acts as.
const SEED_ADMIN: i64 = 1;

/// Demo stores: (store, owner, province, goods as (name, category, price in cents)).
const STORES: &[(&str, &str, &str, &[(&str, &str, i64)])] = &[
    (
        "Chiang Mai Silk House",
        "Somchai Kaewmanee",
        "Chiang Mai",
        &[
            ("Silk Scarf", "Non-Food", 89000),
            ("Silk Cushion Cover", "Non-Food", 45000),
            ("Hand-woven Table Runner", "Non-Food", 62000),
        ],
    ),
    (
        "Chanthaburi Orchards",
        "Malee Srisuk",
        "Chanthaburi",
        &[
            ("Dried Durian Chips", "Food", 18000),
            ("Mangosteen Jam", "Food", 9500),
            ("Dried Mango", "Food", 7500),
        ],
    ),
    (
        "Ayutthaya Pottery",
        "Prasert Wongsa",
        "Ayutthaya",
        &[
            ("Celadon Tea Cup", "Non-Food", 25000),
            ("Terracotta Vase", "Non-Food", 38000),
        ],
    ),
    (
        "Nan Highland Coffee",
        "Kanya Thongdee",
        "Nan",
        &[
            ("Arabica Beans 250g", "Food", 32000),
            ("Drip Coffee Bags", "Food", 15000),
        ],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("OTOP POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS] [DB_PATH]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Engine config file (default: platform config dir)");
                println!("  -d, --db <PATH>      Database file path (overrides the config)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            path if !path.starts_with('-') => db_path = Some(PathBuf::from(path)),
            _ => {}
        }
        i += 1;
    }

    let mut config = EngineConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    println!("OTOP POS Seed Data Generator");
    println!("============================");
    println!("Database: {}", config.database.path.display());
    println!();

    let engine = Engine::open(&config).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = engine.list_products(CatalogTable::OtopProducts).await?;
    if !existing.is_empty() {
        println!("⚠ Database already has {} marketplace products", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let admin = Principal::admin(SEED_ADMIN);
    let start = std::time::Instant::now();
    let mut listed = 0;
    let mut wholesale = 0;

    for (store, owner, province, goods) in STORES {
        let supplier = engine
            .register_supplier(NewSupplier {
                store_name: store.to_string(),
                owner_name: Some(owner.to_string()),
                email: None,
                phone: None,
                address: Some(format!("{} Province, Thailand", province)),
            })
            .await?;
        println!("  Registered {} (#{})", supplier.store_name, supplier.id);

        for (idx, (name, category, price_cents)) in goods.iter().enumerate() {
            let product = engine
                .create_otop_product(
                    admin,
                    NewOtopProduct {
                        name: name.to_string(),
                        description: format!("{} from {}", name, store),
                        category: category.to_string(),
                        price_cents: *price_cents,
                        quantity: 20 + (idx as i64 * 15),
                        store_name: store.to_string(),
                    },
                )
                .await?;
            listed += 1;
            println!("    {} {}", product.sequential_number, product.name);

            engine
                .add_product(
                    Principal::supplier(supplier.id),
                    NewProduct {
                        name: format!("{} (wholesale case)", name),
                        description: Some(format!("Case of 12, {}", province)),
                        category: category.to_string(),
                        price_cents: price_cents * 10,
                        quantity: 50,
                    },
                )
                .await?;
            wholesale += 1;
        }
    }

    println!();
    println!(
        "✓ Seeded {} stores, {} marketplace products, {} wholesale products in {:?}",
        STORES.len(),
        listed,
        wholesale,
        start.elapsed()
    );

    Ok(())
}
