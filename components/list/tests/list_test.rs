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

use std::{fs, io, path::Path};

use glacier_list::{Config, GlacierList, Record, Value};
use rand::{seq::SliceRandom, Rng};

fn record(id: i64) -> Record {
    Record::new()
        .with("id", id)
        .with("name", format!("item {}", id))
        .with("metadata", Record::new().with("tags", vec!["a", "b"]).with("score", id as f64 / 2.0))
}

fn id_of(record: &Record) -> i64 { record.get("id").and_then(Value::as_i64).unwrap() }

fn config(dir: &Path, chunk_size: usize, cache_capacity: usize) -> Config {
    Config::new(dir)
        .with_chunk_size(chunk_size)
        .with_cache_capacity(cache_capacity)
        .with_workers(4)
}

fn chunk_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy();
            name.starts_with("chunk_") && name.ends_with(".bin")
        })
        .count()
}

#[test]
fn chunk_files_follow_record_count() {
    let tempdir = tempfile::tempdir().unwrap();
    for (n, chunk_size) in [(1, 5), (5, 5), (6, 5), (99, 10), (100, 10)] {
        let dir = tempdir.path().join(format!("{}_{}", n, chunk_size));
        let mut list = GlacierList::open(config(&dir, chunk_size, 1)).unwrap();
        list.extend((0..n).map(record)).unwrap();
        list.flush().unwrap();
        let expected = (n as usize + chunk_size - 1) / chunk_size;
        assert_eq!(chunk_files(&dir), expected, "{} records of {}", n, chunk_size);
        assert_eq!(list.chunk_count(), expected);
        list.close().unwrap();
    }
}

#[test]
fn reopen_resumes_the_collection() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut list = GlacierList::open(config(tempdir.path(), 4, 2)).unwrap();
    list.extend((0..10).map(record)).unwrap();
    list.set(3, record(300)).unwrap();
    list.close().unwrap();

    let mut list = GlacierList::open(config(tempdir.path(), 4, 2)).unwrap();
    assert_eq!(list.len(), 10);
    assert_eq!(id_of(&list.get(3).unwrap()), 300);
    // the tail chunk has room for two more before a new one starts.
    list.extend((10..13).map(record)).unwrap();
    assert_eq!(list.chunks().iter().map(|(_, n)| *n).collect::<Vec<_>>(), vec![4, 4, 4, 1]);
    let ids: Vec<i64> = list.to_vec().unwrap().iter().map(id_of).collect();
    let mut expected: Vec<i64> = (0..13).collect();
    expected[3] = 300;
    assert_eq!(ids, expected);
    list.destroy().unwrap();
    assert_eq!(chunk_files(tempdir.path()), 0);
}

#[test]
fn reopen_with_another_chunk_size_is_rejected() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut list = GlacierList::open(config(tempdir.path(), 4, 1)).unwrap();
    list.extend((0..9).map(record)).unwrap();
    list.close().unwrap();

    let err = GlacierList::open(config(tempdir.path(), 3, 1)).err().unwrap();
    assert!(matches!(err, glacier_list::Error::LayoutMismatch { .. }), "{}", err);
}

#[test]
fn dirty_chunks_survive_eviction() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut list = GlacierList::open(config(tempdir.path(), 5, 1)).unwrap();
    list.extend((0..50).map(record)).unwrap();

    let mut rng = rand::thread_rng();
    let mut reference: Vec<i64> = (0..50).collect();
    let mut order: Vec<usize> = (0..50).collect();
    order.shuffle(&mut rng);
    for pos in order {
        let id = rng.gen_range(1_000..2_000);
        list.set(pos as isize, record(id)).unwrap();
        reference[pos] = id;
    }
    for (pos, id) in reference.iter().enumerate() {
        assert_eq!(id_of(&list.get(pos as isize).unwrap()), *id);
    }
    list.close().unwrap();

    let mut list = GlacierList::open(config(tempdir.path(), 5, 3)).unwrap();
    let ids: Vec<i64> = list.iter().map(|r| id_of(&r.unwrap())).collect();
    assert_eq!(ids, reference);
}

#[test]
fn map_is_independent_of_worker_count() {
    let tempdir = tempfile::tempdir().unwrap();
    let double = |mut r: Record| {
        let id = id_of(&r);
        r.insert("double", id * 2);
        r
    };

    let mut results = Vec::new();
    for workers in [1, 2, 8] {
        let dir = tempdir.path().join(workers.to_string());
        let mut list = GlacierList::open(config(&dir, 7, 2)).unwrap();
        list.extend((0..100).map(record)).unwrap();
        list.map_with(double, workers).unwrap();
        results.push(list.to_vec().unwrap());
        list.destroy().unwrap();
    }
    assert_eq!(results[0].len(), 100);
    assert_eq!(results[0][99].get("double"), Some(&Value::Int(198)));
    assert_eq!(results[0], results[1]);
    assert_eq!(results[0], results[2]);
}

#[test]
fn failed_chunks_keep_their_content() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut list = GlacierList::open(config(tempdir.path(), 10, 1)).unwrap();
    list.extend((0..30).map(record)).unwrap();

    let err = list
        .try_map(|mut r| {
            let id = id_of(&r);
            if id == 15 {
                return Err(io::Error::new(io::ErrorKind::Other, "rejected"));
            }
            r.insert("seen", true);
            Ok(r)
        })
        .unwrap_err();
    assert!(err.is_transform());
    assert_eq!(err.failed_chunks(), vec![1]);

    assert_eq!(list.get(5).unwrap().get("seen"), Some(&Value::Bool(true)));
    assert_eq!(list.get(15).unwrap().get("seen"), None);
    assert_eq!(list.get(19).unwrap().get("seen"), None);
    assert_eq!(list.get(25).unwrap().get("seen"), Some(&Value::Bool(true)));

    let err = list
        .map(|r| {
            if id_of(&r) == 29 {
                panic!("boom");
            }
            r
        })
        .unwrap_err();
    assert_eq!(err.failed_chunks(), vec![2]);
    assert!(err.to_string().contains("boom"), "{}", err);
    assert_eq!(list.len(), 30);
}

#[test]
fn serialize_round_trip() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut list = GlacierList::open(config(tempdir.path(), 3, 1)).unwrap();
    let original: Vec<Record> = (0..8)
        .map(|i| record(i).with("active", i % 2 == 0).with("nothing", Value::Null))
        .collect();
    list.extend(original.clone()).unwrap();

    list.serialize().unwrap();
    let stored = list.get(2).unwrap();
    assert_eq!(stored.get("active"), Some(&Value::from("true")));
    assert!(matches!(stored.get("metadata"), Some(Value::Text(_))));
    assert_eq!(stored.get("nothing"), Some(&Value::Null));
    assert_eq!(stored.get("name"), Some(&Value::from("item 2")));

    list.deserialize().unwrap();
    assert_eq!(list.to_vec().unwrap(), original);
}

#[test]
fn pop_and_destroy() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut list = GlacierList::open(config(tempdir.path(), 3, 1)).unwrap();
    list.extend((0..7).map(record)).unwrap();
    list.flush().unwrap();
    assert_eq!(chunk_files(tempdir.path()), 3);

    assert_eq!(id_of(&list.pop().unwrap().unwrap()), 6);
    assert_eq!(chunk_files(tempdir.path()), 2);
    assert_eq!(list.len(), 6);
    assert_eq!(list.to_string(), "GlacierList(6 items, 2 chunks)");

    list.destroy().unwrap();
    assert_eq!(chunk_files(tempdir.path()), 0);
    let list = GlacierList::open(config(tempdir.path(), 3, 1)).unwrap();
    assert_eq!(list.len(), 0);
}

#[test]
fn invalid_config_is_rejected() {
    let tempdir = tempfile::tempdir().unwrap();
    assert!(GlacierList::open(config(tempdir.path(), 0, 1)).is_err());
    assert!(GlacierList::open(config(tempdir.path(), 3, 0)).is_err());
}
