//! Seed script for the Blink Motors document store.
//!
//! Populates:
//! - an admin identity (email from `BLINK_ADMIN_EMAIL`, default admin@blinkmotors.test)
//! - sample products
//! - one blog post and one review
//!
//! Run: cargo run --bin seed_data   (stop the server first, Sled holds a file lock)

use blink_motors::config::Config;
use blink_motors::logging;
use blink_motors::models::Document;
use blink_motors::storage::{Collection, Storage};
use serde_json::{json, Value};

fn object(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let _log_guard = logging::init(&config.log);
    let storage = Storage::open(&config.db_path)?;

    let admin_email =
        std::env::var("BLINK_ADMIN_EMAIL").unwrap_or_else(|_| "admin@blinkmotors.test".to_string());
    let admin = object(json!({ "name": "Blink Admin", "role": "admin" }));
    let result = storage.upsert_identity(&admin_email, &admin)?;
    tracing::info!(email = %admin_email, upserted = result.upserted_count, "admin identity ready");

    let products = [
        ("Brake pad set", "brakes", 45.0, 120),
        ("Spark plug (4 pack)", "engine", 18.5, 300),
        ("Synthetic oil 5W-30", "fluids", 32.0, 80),
        ("LED headlight bulb", "lighting", 27.99, 150),
        ("Wiper blades", "exterior", 14.0, 200),
    ];
    for (name, category, price, quantity) in products {
        storage.insert_one(
            Collection::Products,
            object(json!({
                "name": name,
                "category": category,
                "price": price,
                "availableQuantity": quantity,
                "minimumOrder": 1,
            })),
        )?;
    }

    storage.insert_one(
        Collection::Blogs,
        object(json!({
            "title": "Keeping your brakes healthy",
            "author": admin_email,
            "body": "Inspect pads every 10,000 km and replace them before the indicator chirps.",
        })),
    )?;
    storage.insert_one(
        Collection::Reviews,
        object(json!({
            "name": "Sample Customer",
            "rating": 5,
            "comment": "Fast delivery, genuine parts.",
        })),
    )?;

    for collection in Collection::ALL {
        let count = storage.find_all(collection)?.len();
        tracing::info!(collection = collection.name(), count, "seeded");
    }

    storage.close().await?;
    Ok(())
}
