//! Benchmarks for CanopyKV data structures

use canopykv::{BTree, BTreeConfig, MemoryNodeStore, PagedList, PagedListConfig};
use criterion::{criterion_group, criterion_main, Criterion};

fn btree_benchmarks(c: &mut Criterion) {
    c.bench_function("btree_put_1000", |b| {
        b.iter(|| {
            let store: MemoryNodeStore<u32, String> = MemoryNodeStore::new();
            let config = BTreeConfig::builder().min_data(8).build();
            let tree = BTree::with_config(&1, store, config).unwrap();
            for k in 0..1000u32 {
                tree.put(k, "value".to_string()).unwrap();
            }
        })
    });

    c.bench_function("btree_get_hot", |b| {
        let store: MemoryNodeStore<u32, String> = MemoryNodeStore::new();
        let config = BTreeConfig::builder().min_data(8).build();
        let tree = BTree::with_config(&1, store, config).unwrap();
        for k in 0..1000u32 {
            tree.put(k, "value".to_string()).unwrap();
        }

        b.iter(|| {
            for k in (0..1000u32).step_by(7) {
                criterion::black_box(tree.get(&k).unwrap());
            }
        })
    });

    c.bench_function("paged_list_push_1000", |b| {
        b.iter(|| {
            let store: MemoryNodeStore<String, String> = MemoryNodeStore::new();
            let config = PagedListConfig::builder().page_size(32).build();
            let list = PagedList::with_config("head".to_string(), store, config);
            for i in 0..1000 {
                list.push(i.to_string()).unwrap();
            }
        })
    });
}

criterion_group!(benches, btree_benchmarks);
criterion_main!(benches);
