use std::sync::Arc;

use stratum::buffer::BufferPoolManager;
use stratum::index::{BPlusTree, OrdComparator};
use stratum::storage::disk::DiskManager;
use stratum::{PageId, RecordId, SlotId};

fn main() {
    println!("Stratum - storage engine core demo");
    println!("==================================\n");

    let db_path = "demo.db";

    let disk_manager = Arc::new(DiskManager::new(db_path).expect("failed to open database file"));
    println!("Opened database file: {}", db_path);

    let bpm = Arc::new(BufferPoolManager::new(16, 2, disk_manager));
    println!("Created buffer pool with 16 frames (LRU-2)\n");

    let tree: BPlusTree<u64, OrdComparator> =
        BPlusTree::new("demo_index", Arc::clone(&bpm), OrdComparator, 8, 8);

    for key in [42u64, 7, 19, 3, 88, 61, 25, 50, 14, 70] {
        let rid = RecordId::new(PageId::new(100), SlotId::new(key as u16));
        tree.insert(&key, rid).expect("insert failed");
        println!("Inserted key {}", key);
    }

    println!("\nRoot page: {}", tree.root_page_id());

    let value = tree.get_value(&19).expect("lookup failed");
    println!("Lookup 19 -> {:?}", value);

    println!("\nOrdered scan:");
    for item in tree.iter().expect("iterator failed") {
        let (key, rid) = item.expect("scan failed");
        println!("  {} -> {}", key, rid);
    }

    for key in [7u64, 42, 88] {
        tree.remove(&key).expect("remove failed");
        println!("Removed key {}", key);
    }

    println!("\nScan after removals:");
    for item in tree.iter().expect("iterator failed") {
        let (key, _) = item.expect("scan failed");
        print!("{} ", key);
    }
    println!();

    bpm.flush_all_pages().expect("flush failed");
    println!("\nFlushed all pages");

    std::fs::remove_file(db_path).ok();
    println!("Demo completed");
}
