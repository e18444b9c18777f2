//! Demonstrates durability across Close/Open cycles.

use mini_kvstore_v2::{Database, StoreConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== Persistence Demo ===");

    let dir = "demos_data/persistence";

    // Session 1: write values.
    {
        let db = Database::open(StoreConfig::test_config(dir)).await?;
        db.put("session", "first").await?;
        db.put("counter", "42").await?;
        db.put("name", "Test Store").await?;
        println!("✓ Values written: session, counter, name");
        db.close().await?;
    }

    // Session 2: read and update.
    {
        let db = Database::open(StoreConfig::test_config(dir)).await?;
        assert_eq!(db.get("session").await?, "first");
        assert_eq!(db.get("counter").await?, "42");
        assert_eq!(db.get("name").await?, "Test Store");
        println!("✓ All values persisted correctly from session 1");

        db.put("counter", "43").await?;
        println!("✓ Counter updated to 43");
        db.close().await?;
    }

    // Session 3: verify the update survived too.
    {
        let db = Database::open(StoreConfig::test_config(dir)).await?;
        assert_eq!(db.get("session").await?, "first");
        assert_eq!(db.get("counter").await?, "43");
        println!("✓ Session and updated counter verified");
        db.close().await?;
    }

    Ok(())
}
