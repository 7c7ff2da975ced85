//! # Seed Data Generator
//!
//! Populates a development database with a small clothing shop.
//!
//! ## Usage
//! ```bash
//! # Default: ./shopkeep_dev.db, 2 batches per variant
//! cargo run -p shopkeep-db --bin seed
//!
//! # More restocks per variant
//! cargo run -p shopkeep-db --bin seed -- --batches 4
//!
//! # Specify database path
//! cargo run -p shopkeep-db --bin seed -- --db ./data/shop.db
//! ```
//!
//! ## Generated Data
//! - Batches for every product × color × size, restocked `--batches` times
//!   (so batch numbers and colors are visible)
//! - A handful of customers, some with credit sales and open debts
//! - One supplier with an open purchase debt
//! - One pending storefront order

use std::env;

use shopkeep_core::cart::Cart;
use shopkeep_core::invoice::InvoiceDraft;
use shopkeep_core::loyalty::LoyaltyPolicy;
use shopkeep_core::storefront::{OrderContact, OrderLineRequest};
use shopkeep_core::{Batch, Money};
use shopkeep_db::repository::batch::NewBatch;
use shopkeep_db::repository::customer::NewCustomer;
use shopkeep_db::repository::order::PlaceOrder;
use shopkeep_db::repository::supplier::NewSupplier;
use shopkeep_db::{Database, DbConfig};

/// `(name, unit, base sale price in cents)`
const PRODUCTS: &[(&str, &str, i64)] = &[
    ("Linen Shirt", "pc", 29_000),
    ("Oxford Shirt", "pc", 32_000),
    ("Chino Trousers", "pc", 45_000),
    ("Denim Jacket", "pc", 89_000),
    ("Silk Scarf", "pc", 18_000),
    ("Wool Socks", "pair", 6_000),
];

const COLORS: &[&str] = &["White", "Navy", "Sand"];

const SIZES: &[&str] = &["S", "M", "L"];

const CUSTOMERS: &[(&str, &str)] = &[
    ("Mai Nguyen", "0912 345 678"),
    ("Hoa Tran", "0987 654 321"),
    ("Linh Pham", "0903 111 222"),
    ("Thu Le", "0934 555 666"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut batches_per_variant: usize = 2;
    let mut db_path = String::from("./shopkeep_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--batches" | "-b" => {
                if i + 1 < args.len() {
                    batches_per_variant = args[i + 1].parse().unwrap_or(2).max(1);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Shopkeep Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -b, --batches <N>  Batches per variant (default: 2)");
                println!("  -d, --db <PATH>    Database file path (default: ./shopkeep_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Shopkeep Seed Data Generator");
    println!("===============================");
    println!("Database: {}", db_path);
    println!("Batches per variant: {}", batches_per_variant);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.batches().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} batches", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Supplier and stock
    let supplier = db
        .suppliers()
        .create(&NewSupplier {
            name: "Northern Mill".to_string(),
            phone: Some("024 3826 1111".to_string()),
            address: Some("Ha Dong, Hanoi".to_string()),
        })
        .await?;

    println!();
    println!("Receiving stock...");
    let start = std::time::Instant::now();
    let mut received: Vec<Batch> = Vec::new();
    let mut seed: usize = 0;

    for (name, unit, base_price) in PRODUCTS {
        for color in COLORS {
            for size in SIZES {
                for restock in 0..batches_per_variant {
                    seed += 1;
                    let batch = db
                        .batches()
                        .insert(&generate_batch(
                            name,
                            unit,
                            color,
                            size,
                            *base_price,
                            restock,
                            seed,
                            &supplier.id,
                        ))
                        .await?;
                    received.push(batch);
                }
            }
        }
    }
    println!(
        "✓ Received {} batches in {:?}",
        received.len(),
        start.elapsed()
    );

    let purchase: i64 = received
        .iter()
        .map(|b| b.cost_price_cents * b.quantity)
        .sum();
    db.debts()
        .create_supplier_debt(
            &supplier.id,
            Money::from_cents(purchase / 4),
            Some("Opening stock, balance due".to_string()),
        )
        .await?;
    println!("✓ Supplier debt recorded: {}", Money::from_cents(purchase / 4));

    // Customers and sales
    println!();
    println!("Recording sales...");
    let policy = LoyaltyPolicy::default();
    let mut sales = 0;

    for (idx, (name, phone)) in CUSTOMERS.iter().enumerate() {
        let customer = db
            .customers()
            .create(&NewCustomer {
                name: name.to_string(),
                phone: Some(phone.to_string()),
                address: None,
            })
            .await?;

        for visit in 0..(idx + 1) {
            let mut cart = Cart::new();
            for offset in 0..2 {
                let pick = &received[(idx * 7 + visit * 3 + offset * 11) % received.len()];
                if let Some(batch) = db.batches().get_by_id(&pick.id).await? {
                    if batch.quantity > 0 {
                        cart.add_item(&batch, 1)?;
                    }
                }
            }
            if cart.is_empty() {
                continue;
            }

            // Every other customer leaves part of the bill on credit
            let total = cart.totals(policy.discount_rate(customer.vip_tier)).total_cents;
            let tendered = if idx % 2 == 1 { total / 2 } else { total };
            let draft =
                InvoiceDraft::from_cart(&cart, Some(&customer), Money::from_cents(tendered), &policy)?;
            db.invoices().create(&draft, &policy).await?;
            sales += 1;
        }
    }

    let walk_in = &received[0];
    let mut cart = Cart::new();
    cart.add_item(walk_in, 1)?;
    let draft = InvoiceDraft::from_cart(&cart, None, walk_in.sale_price(), &policy)?;
    db.invoices().create(&draft, &policy).await?;
    sales += 1;
    println!("✓ Recorded {} sales", sales);

    // Storefront order
    let listed = db.batches().list_storefront().await?;
    if let Some(batch) = listed.first() {
        let order = db
            .orders()
            .place(&PlaceOrder {
                contact: OrderContact {
                    name: "Quang Vu".to_string(),
                    phone: "0977 888 999".to_string(),
                    address: Some("8 Trang Tien, Hanoi".to_string()),
                },
                lines: vec![OrderLineRequest {
                    batch_id: batch.id.clone(),
                    quantity: 1,
                }],
                note: Some("Gift wrap please".to_string()),
            })
            .await?;
        println!("✓ Storefront order placed: {}", order.order_number);
    }

    println!();
    println!("Verifying...");
    let results = db.batches().search("shirt").await?;
    println!("  Search 'shirt': {} batches", results.len());
    let owed = db
        .debts()
        .outstanding_total(shopkeep_core::DebtParty::Customer)
        .await?;
    println!("  Customer debt outstanding: {}", owed);

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Builds one received batch with deterministic pseudo-random figures.
#[allow(clippy::too_many_arguments)]
fn generate_batch(
    name: &str,
    unit: &str,
    color: &str,
    size: &str,
    base_price: i64,
    restock: usize,
    seed: usize,
    supplier_id: &str,
) -> NewBatch {
    // Later restocks cost a little more
    let sale_price_cents = base_price + (restock as i64) * 1_000;
    let cost_pct = 40 + (seed % 15) as i64;
    let cost_price_cents = sale_price_cents * cost_pct / 100;

    NewBatch {
        name: name.to_string(),
        color: color.to_string(),
        quality: String::new(),
        size: size.to_string(),
        unit: unit.to_string(),
        cost_price_cents,
        sale_price_cents,
        quantity: 3 + (seed % 12) as i64,
        storefront_visible: seed % 3 != 0,
        description: Some(format!("{} in {}", name, color.to_lowercase())),
        image_url: None,
        supplier_id: Some(supplier_id.to_string()),
    }
}
