// Copyright 2024 glacier-list
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Applies a function to every record, one chunk at a time, on a pool of
//! scoped threads.
//!
//! Workers pull chunk ids from a shared queue, so every chunk is owned by
//! exactly one worker for the whole call and no locking of chunk contents is
//! needed. Workers talk to the [ChunkStore] directly and never touch the
//! working set; the caller flushes it before and drops it after.
//!
//! A chunk whose transform fails is not written back and keeps its previous
//! content on disk. The remaining chunks are still processed, and every
//! failure is reported together once all workers are done.

use std::{
    any::Any,
    fmt::{Display, Formatter},
    panic::{self, AssertUnwindSafe},
    time::Instant,
};

use crossbeam::queue::SegQueue;
use glacier_common::ChunkId;
use glacier_storage::ChunkStore;
use glacier_types::Record;
use tracing::{debug, info, warn};

use crate::err::{Result, TransformSnafu};

#[derive(Debug)]
pub enum FailureCause {
    /// Reading, decoding, encoding or writing the chunk failed.
    Storage(glacier_storage::err::Error),
    /// The transform returned an error.
    User(Box<dyn std::error::Error + Send + Sync>),
    /// The transform panicked.
    Panicked(String),
}

impl Display for FailureCause {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureCause::Storage(e) => write!(f, "{}", e),
            FailureCause::User(e) => write!(f, "transform error: {}", e),
            FailureCause::Panicked(msg) => write!(f, "transform panicked: {}", msg),
        }
    }
}

#[derive(Debug)]
pub struct ChunkFailure {
    pub chunk_id: ChunkId,
    pub cause:    FailureCause,
}

impl Display for ChunkFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "chunk {}: {}", self.chunk_id, self.cause)
    }
}

/// Run `f` over every record of `chunks` with up to `workers` threads.
pub fn run<F, E>(store: &ChunkStore, chunks: &[ChunkId], workers: usize, f: &F) -> Result<()>
where
    F: Fn(Record) -> std::result::Result<Record, E> + Sync,
    E: std::error::Error + Send + Sync + 'static,
{
    if chunks.is_empty() {
        return Ok(());
    }
    let workers = workers.clamp(1, chunks.len());
    let start = Instant::now();
    info!("transform {} chunks with {} workers", chunks.len(), workers);

    let queue = SegQueue::new();
    chunks.iter().for_each(|id| queue.push(*id));

    let outcome = crossbeam::thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let queue = &queue;
                s.spawn(move |_| {
                    let mut failures = Vec::new();
                    while let Some(chunk_id) = queue.pop() {
                        match transform_chunk(store, chunk_id, f) {
                            Ok(n) => debug!("worker {} transformed chunk {} ({} records)", worker, chunk_id, n),
                            Err(cause) => {
                                warn!("worker {} failed on chunk {}: {}", worker, chunk_id, cause);
                                failures.push(ChunkFailure { chunk_id, cause });
                            }
                        }
                    }
                    failures
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join())
            .collect::<Vec<_>>()
    });

    let mut failures = Vec::new();
    // every per-chunk panic is caught inside the worker, so a join error
    // means the pool itself broke.
    let joined = outcome.unwrap_or_else(|payload| panic::resume_unwind(payload));
    for result in joined {
        match result {
            Ok(mut batch) => failures.append(&mut batch),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    info!(
        "transform finished in {:?}, {} of {} chunks failed",
        start.elapsed(),
        failures.len(),
        chunks.len()
    );
    if failures.is_empty() {
        return Ok(());
    }
    failures.sort_by_key(|f| f.chunk_id);
    TransformSnafu { failures }.fail()
}

fn transform_chunk<F, E>(
    store: &ChunkStore,
    chunk_id: ChunkId,
    f: &F,
) -> std::result::Result<usize, FailureCause>
where
    F: Fn(Record) -> std::result::Result<Record, E> + Sync,
    E: std::error::Error + Send + Sync + 'static,
{
    let records = store.load(chunk_id).map_err(FailureCause::Storage)?;
    let transformed = panic::catch_unwind(AssertUnwindSafe(|| {
        records
            .into_iter()
            .map(f)
            .collect::<std::result::Result<Vec<_>, E>>()
    }))
    .map_err(|payload| FailureCause::Panicked(panic_message(payload)))?
    .map_err(|e| FailureCause::User(Box::new(e)))?;
    store
        .save(chunk_id, &transformed)
        .map_err(FailureCause::Storage)?;
    Ok(transformed.len())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast_ref::<&'static str>() {
        Some(s) => s.to_string(),
        None => match payload.downcast_ref::<String>() {
            Some(s) => s.clone(),
            None => "Box<dyn Any>".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::{convert::Infallible, sync::Arc};

    use glacier_types::Value;

    use super::*;

    fn fill(store: &ChunkStore, chunks: usize, per_chunk: i64) -> Vec<ChunkId> {
        (0..chunks)
            .map(|c| {
                let id = store.allocate_id();
                let records: Vec<Record> = (0..per_chunk)
                    .map(|i| Record::new().with("value", c as i64 * per_chunk + i))
                    .collect();
                store.save(id, &records).unwrap();
                id
            })
            .collect()
    }

    fn triple(mut r: Record) -> std::result::Result<Record, Infallible> {
        if let Some(Value::Int(n)) = r.get("value").cloned() {
            r.insert("value", n * 3);
        }
        r.insert("processed", true);
        Ok(r)
    }

    #[test]
    fn one_and_many_workers_agree() {
        glacier_utils::logger::install_fmt_log();
        let mut results = Vec::new();
        for workers in [1, 4, 64] {
            let tempdir = tempfile::tempdir().unwrap();
            let store = Arc::new(ChunkStore::open(tempdir.path()).unwrap());
            let ids = fill(&store, 9, 5);
            run(&store, &ids, workers, &triple).unwrap();
            let all: Vec<Record> = ids.iter().flat_map(|id| store.load(*id).unwrap()).collect();
            results.push(all);
        }
        assert_eq!(results[0].len(), 45);
        assert_eq!(results[0][7].get("value"), Some(&Value::Int(21)));
        assert_eq!(results[0][7].get("processed"), Some(&Value::Bool(true)));
        assert_eq!(results[0], results[1]);
        assert_eq!(results[1], results[2]);
    }

    #[derive(Debug)]
    struct Rejected(i64);

    impl Display for Rejected {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "rejected {}", self.0) }
    }

    impl std::error::Error for Rejected {}

    #[test]
    fn failing_chunks_keep_their_content() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(tempdir.path()).unwrap();
        let ids = fill(&store, 4, 3);
        let before = store.load(1).unwrap();

        // values 3..6 live in chunk 1; value 10 is in chunk 3 and panics.
        let f = |mut r: Record| {
            let n = r.get("value").and_then(Value::as_i64).unwrap_or_default();
            if n == 4 {
                return Err(Rejected(n));
            }
            if n == 10 {
                panic!("value {} is cursed", n);
            }
            r.insert("value", n + 100);
            Ok(r)
        };
        let err = run(&store, &ids, 2, &f).unwrap_err();
        assert!(err.is_transform());
        assert_eq!(err.failed_chunks(), vec![1, 3]);
        let msg = err.to_string();
        assert!(msg.contains("chunk 1: transform error: rejected 4"), "{}", msg);
        assert!(msg.contains("chunk 3: transform panicked: value 10 is cursed"), "{}", msg);

        assert_eq!(store.load(1).unwrap(), before);
        assert_eq!(store.load(0).unwrap()[0].get("value"), Some(&Value::Int(100)));
        assert_eq!(store.load(2).unwrap()[0].get("value"), Some(&Value::Int(106)));
    }

    #[test]
    fn missing_chunk_is_reported() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(tempdir.path()).unwrap();
        let mut ids = fill(&store, 2, 2);
        ids.push(77);
        let err = run(&store, &ids, 3, &triple).unwrap_err();
        assert_eq!(err.failed_chunks(), vec![77]);
        assert!(matches!(
            &err,
            crate::Error::Transform { failures, .. }
                if matches!(&failures[0].cause, FailureCause::Storage(e) if e.is_not_found())
        ));
    }

    #[test]
    fn nothing_to_do() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(tempdir.path()).unwrap();
        run(&store, &[], 4, &triple).unwrap();
    }
}
