//! Pool accounting as seen through documents and contexts.

use blittable_format::{ContextConfig, DocumentContext};
use blittable_memory::{GrowableBuffer, MemoryPool, PoolConfig, PoolError};
use blittable_testkit::prelude::*;
use serde_json::json;
use std::sync::Arc;

#[test]
fn documents_return_every_block() {
    init_test_tracing();
    let pool = MemoryPool::shared(PoolConfig::default());
    {
        let mut ctx = DocumentContext::new(Arc::clone(&pool), ContextConfig::default()).unwrap();
        for i in 0..20 {
            let doc = blittable_format::write_document(
                blittable_format::TokenBuffer::from_json(&json!({"i": i, "text": "x".repeat(500)})).unwrap(),
                &mut ctx,
            )
            .unwrap();
            let root = doc.reader(&ctx).unwrap();
            assert_eq!(root.get("i").unwrap().as_integer(), Some(i));
        }
        assert!(pool.stats().outstanding_blocks > 0);
    }

    let stats = pool.stats();
    assert_eq!(stats.outstanding_blocks, 0);
    assert_eq!(stats.outstanding_bytes, 0);
    assert_eq!(stats.acquire_calls, stats.release_calls);
}

#[test]
fn document_buffers_are_tagged_with_their_owner() {
    let pool = MemoryPool::shared(PoolConfig::default());
    let mut ctx = DocumentContext::new(Arc::clone(&pool), ContextConfig::default()).unwrap();
    let buffer = ctx.new_buffer().unwrap();

    let owners: Vec<String> = pool
        .outstanding_records()
        .into_iter()
        .filter_map(|record| record.owner.map(|owner| owner.to_string()))
        .collect();
    assert_eq!(owners.len(), 1);
    assert!(owners[0].starts_with("document-"));
    drop(buffer);
    assert!(pool
        .outstanding_records()
        .iter()
        .all(|record| record.owner.is_none()));
}

#[test]
fn recycled_blocks_serve_later_documents() {
    let mut env = TestEnv::new();
    drop(env.encode(&employee_json()));
    let free_after_first = env.pool.stats().free_blocks;
    assert!(free_after_first > 0);

    let acquires = env.pool.stats().acquire_calls;
    drop(env.encode(&employee_json()));
    let stats = env.pool.stats();
    assert!(stats.acquire_calls > acquires);
    assert!(stats.free_blocks >= free_after_first);
}

#[test]
fn buffer_segments_linearize_in_order() {
    let pool = MemoryPool::shared(PoolConfig::default());
    let mut buffer = GrowableBuffer::new(Arc::clone(&pool), 4, None).unwrap();
    let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
    for chunk in data.chunks(97) {
        buffer.write(chunk).unwrap();
    }
    assert_eq!(buffer.logical_size(), data.len());
    assert_eq!(buffer.to_vec(), data);

    let mut dest = vec![0u8; data.len()];
    assert_eq!(buffer.copy_into(&mut dest), data.len());
    assert_eq!(dest, data);

    buffer.dispose();
    assert_eq!(pool.stats().outstanding_blocks, 0);
}

#[test]
fn low_memory_drains_free_lists() {
    let mut env = TestEnv::new();
    drop(env.encode(&flat_object_json(100)));
    assert!(env.pool.stats().free_blocks > 0);

    let released = env.pool.on_low_memory();
    assert!(released > 0);
    assert_eq!(env.pool.stats().free_blocks, 0);

    // The pool keeps working afterwards.
    assert_eq!(env.roundtrip(&employee_json()), employee_json());
}

#[test]
fn foreign_blocks_are_rejected() {
    let a = MemoryPool::new(PoolConfig::default());
    let b = MemoryPool::new(PoolConfig::default());
    let block = a.acquire(64).unwrap();
    let id = block.id();
    assert!(matches!(
        b.release(block),
        Err(PoolError::ForeignBlock { .. })
    ));
    assert!(a.is_outstanding(id));
}
