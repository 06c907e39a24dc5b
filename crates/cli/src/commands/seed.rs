//! Demo data seeding.

use zagros_core::Toman;
use zagros_server::db::ProductStore;
use zagros_server::db::postgres::PgProductStore;
use zagros_server::models::NewProduct;

use super::CommandError;

/// Seed a handful of demo products for local development.
pub async fn run() -> Result<(), CommandError> {
    let pool = super::connect().await?;
    let products = PgProductStore::new(pool);

    let demo = [
        ("Android tablet 10\"", 18_500_000_i64, 25, false),
        ("Bluetooth headphones", 3_200_000, 60, false),
        ("USB-C fast charger", 850_000, 200, true),
        ("Tempered glass screen protector", 250_000, 500, true),
        ("Laptop stand", 1_450_000, 80, false),
    ];

    for (name, price, stock, is_accessory) in demo {
        let product = products
            .create(NewProduct {
                name: name.to_owned(),
                description: format!("{name} (demo product)"),
                price: Toman::new(price),
                stock,
                is_active: true,
                is_accessory,
            })
            .await?;
        tracing::info!(product_id = %product.id, name = %product.name, "seeded product");
    }

    tracing::info!("Seeding complete");
    Ok(())
}
