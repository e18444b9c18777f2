use mini_kvstore_v2::{Database, StoreConfig};
use std::time::Instant;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== Large Dataset Demo ===\n");

    let config = StoreConfig {
        data_dir: "demos_data/large_dataset".into(),
        max_segment_size: 16 * 1024 * 1024,
        fsync_policy: mini_kvstore_v2::store::config::FsyncPolicy::Never,
    };
    let db = Database::open(config).await?;

    println!("Inserting 10,000 keys...");
    let start = Instant::now();
    for i in 0..10_000 {
        let key = format!("user:{i:05}:data");
        let value = format!("User data for ID {i}");
        db.put(&key, &value).await?;

        if (i + 1) % 2000 == 0 {
            println!("  {} keys inserted...", i + 1);
        }
    }
    let insert_duration = start.elapsed();
    println!("✓ Insertion completed in {:.2}s", insert_duration.as_secs_f64());

    println!("\nReading 1,000 keys...");
    let start = Instant::now();
    for i in (0..10_000).step_by(10) {
        let key = format!("user:{i:05}:data");
        let _ = db.get(&key).await?;
    }
    let read_duration = start.elapsed();
    println!("✓ Read completed in {:.2}s", read_duration.as_secs_f64());

    let stats = db.stats().await?;
    println!("\n✓ Final statistics:");
    println!("{stats}");

    println!("\nPerformance:");
    println!(
        "  Insert rate: {:.0} keys/sec",
        10_000.0 / insert_duration.as_secs_f64()
    );
    println!(
        "  Read rate: {:.0} keys/sec",
        1_000.0 / read_duration.as_secs_f64()
    );

    db.close().await?;
    Ok(())
}
