//! Basic usage demo for the KVStore.

use mini_kvstore_v2::{Database, StoreConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== Basic Usage: mini-kvstore-v2 ===");

    let db = Database::open(StoreConfig::test_config("demos_data/basic_usage")).await?;

    db.put("user:1:name", "Alice").await?;
    db.put("user:1:email", "alice@example.com").await?;
    db.put("user:2:name", "Bob").await?;
    db.put("user:2:email", "bob@example.com").await?;

    let name = db.get("user:1:name").await?;
    assert_eq!(name, "Alice");
    println!("✓ User 1 name: {name}");

    let email = db.get("user:1:email").await?;
    assert_eq!(email, "alice@example.com");
    println!("✓ User 1 email: {email}");

    // Last-writer-wins: overwriting a key replaces its value, not a delete.
    db.put("user:2:email", "bob2@example.com").await?;
    let bob_email = db.get("user:2:email").await?;
    assert_eq!(bob_email, "bob2@example.com");
    println!("✓ Updated user 2 email: {bob_email}");

    let bob_name = db.get("user:2:name").await?;
    assert_eq!(bob_name, "Bob");
    println!("✓ User 2 name unaffected: {bob_name}");

    let stats = db.stats().await?;
    println!("{stats}");

    db.close().await?;
    Ok(())
}
