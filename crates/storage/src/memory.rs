//! In-memory object store that records every call.
//!
//! Faults can be injected per part number (transient or permanent failure,
//! artificial latency) to exercise retry, ordering and abort paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::checksum::checksum_bytes;
use crate::store::{CompletedPart, MultipartSession, ObjectInfo, ObjectStore, StorageFuture, check_part_order};
use crate::{StorageError, validate_object_key};

const BUCKET: &str = "memory";

/// Counters and arguments of every call made against the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallLog {
    pub creates: usize,
    pub part_attempts: usize,
    pub puts: usize,
    pub completes: usize,
    pub aborts: usize,
    /// Part numbers passed to each `complete_multipart` call, in call order.
    pub completed_part_lists: Vec<Vec<u32>>,
    /// Sizes of the buffers passed to each `put_object` call.
    pub put_sizes: Vec<usize>,
    /// Highest number of part uploads observed running at once.
    pub max_parts_in_flight: usize,
}

#[derive(Default)]
struct Faults {
    fail_create: bool,
    /// `None` fails forever, `Some(n)` fails the next `n` attempts.
    part_failures: HashMap<u32, Option<usize>>,
    part_delays: HashMap<u32, Duration>,
}

#[derive(Default)]
struct Inner {
    objects: HashMap<String, Vec<u8>>,
    sessions: HashMap<String, BTreeMap<u32, Vec<u8>>>,
    next_upload: u64,
    parts_in_flight: usize,
    calls: CallLog,
}

/// Object store kept entirely in memory.
#[derive(Default)]
pub struct MemoryObjectStore {
    inner: Mutex<Inner>,
    faults: Mutex<Faults>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `create_multipart` call fail.
    pub fn fail_create(&self) {
        lock(&self.faults).fail_create = true;
    }

    /// Fails the next `times` upload attempts of `part_number`.
    pub fn fail_part(&self, part_number: u32, times: usize) {
        lock(&self.faults)
            .part_failures
            .insert(part_number, Some(times));
    }

    /// Fails every upload attempt of `part_number`.
    pub fn fail_part_always(&self, part_number: u32) {
        lock(&self.faults).part_failures.insert(part_number, None);
    }

    /// Delays every upload of `part_number` by `delay`.
    pub fn delay_part(&self, part_number: u32, delay: Duration) {
        lock(&self.faults).part_delays.insert(part_number, delay);
    }

    /// Snapshot of the call log.
    pub fn calls(&self) -> CallLog {
        lock(&self.inner).calls.clone()
    }

    /// Returns a stored object.
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        lock(&self.inner).objects.get(key).cloned()
    }

    /// Number of multipart sessions neither completed nor aborted.
    pub fn open_sessions(&self) -> usize {
        lock(&self.inner).sessions.len()
    }

    fn session_missing(&self, session: &MultipartSession) -> bool {
        !lock(&self.inner).sessions.contains_key(&session.upload_id)
    }

    async fn store_part(
        &self,
        session: &MultipartSession,
        part_number: u32,
        data: &[u8],
    ) -> Result<CompletedPart, StorageError> {
        let delay = lock(&self.faults).part_delays.get(&part_number).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.take_part_failure(part_number) {
            return Err(StorageError::remote(
                500,
                "InternalError",
                format!("injected failure for part {part_number}"),
            ));
        }

        let mut inner = lock(&self.inner);
        let Some(parts) = inner.sessions.get_mut(&session.upload_id) else {
            return Err(StorageError::no_such_upload(&session.upload_id));
        };
        parts.insert(part_number, data.to_vec());
        Ok(CompletedPart {
            part_number,
            etag: checksum_bytes(data),
        })
    }

    /// Consumes one injected failure for `part_number`, if any.
    fn take_part_failure(&self, part_number: u32) -> bool {
        let mut faults = lock(&self.faults);
        match faults.part_failures.get_mut(&part_number) {
            Some(None) => true,
            Some(Some(0)) | None => false,
            Some(Some(remaining)) => {
                *remaining -= 1;
                true
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ObjectStore for MemoryObjectStore {
    fn create_multipart<'a>(&'a self, key: &'a str) -> StorageFuture<'a, MultipartSession> {
        Box::pin(async move {
            validate_object_key(key)?;
            let fail = lock(&self.faults).fail_create;
            let mut inner = lock(&self.inner);
            inner.calls.creates += 1;
            if fail {
                return Err(StorageError::remote(
                    503,
                    "ServiceUnavailable",
                    "injected create failure",
                ));
            }
            inner.next_upload += 1;
            let upload_id = format!("mem-{}", inner.next_upload);
            inner.sessions.insert(upload_id.clone(), BTreeMap::new());
            Ok(MultipartSession {
                upload_id,
                bucket: BUCKET.into(),
                key: key.to_string(),
            })
        })
    }

    fn upload_part<'a>(
        &'a self,
        session: &'a MultipartSession,
        part_number: u32,
        data: &'a [u8],
    ) -> StorageFuture<'a, CompletedPart> {
        Box::pin(async move {
            {
                let mut inner = lock(&self.inner);
                inner.calls.part_attempts += 1;
                inner.parts_in_flight += 1;
                inner.calls.max_parts_in_flight =
                    inner.calls.max_parts_in_flight.max(inner.parts_in_flight);
            }
            let result = self.store_part(session, part_number, data).await;
            lock(&self.inner).parts_in_flight -= 1;
            result
        })
    }

    fn complete_multipart<'a>(
        &'a self,
        session: &'a MultipartSession,
        parts: Vec<CompletedPart>,
    ) -> StorageFuture<'a, ObjectInfo> {
        Box::pin(async move {
            let mut inner = lock(&self.inner);
            inner.calls.completes += 1;
            inner
                .calls
                .completed_part_lists
                .push(parts.iter().map(|p| p.part_number).collect());

            check_part_order(&parts)?;
            let Some(staged) = inner.sessions.get(&session.upload_id) else {
                return Err(StorageError::no_such_upload(&session.upload_id));
            };

            let mut object = Vec::new();
            for part in &parts {
                match staged.get(&part.part_number) {
                    Some(data) if checksum_bytes(data) == part.etag => {
                        object.extend_from_slice(data)
                    }
                    _ => {
                        return Err(StorageError::remote(
                            400,
                            "InvalidPart",
                            format!("part {} missing or modified", part.part_number),
                        ));
                    }
                }
            }

            inner.sessions.remove(&session.upload_id);
            let info = ObjectInfo {
                bucket: BUCKET.into(),
                key: session.key.clone(),
                size: object.len() as u64,
                etag: checksum_bytes(&object),
            };
            inner.objects.insert(session.key.clone(), object);
            Ok(info)
        })
    }

    fn abort_multipart<'a>(&'a self, session: &'a MultipartSession) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            let missing = self.session_missing(session);
            let mut inner = lock(&self.inner);
            inner.calls.aborts += 1;
            if missing {
                return Err(StorageError::no_such_upload(&session.upload_id));
            }
            inner.sessions.remove(&session.upload_id);
            Ok(())
        })
    }

    fn put_object<'a>(&'a self, key: &'a str, data: Vec<u8>) -> StorageFuture<'a, ObjectInfo> {
        Box::pin(async move {
            validate_object_key(key)?;
            let mut inner = lock(&self.inner);
            inner.calls.puts += 1;
            inner.calls.put_sizes.push(data.len());
            let info = ObjectInfo {
                bucket: BUCKET.into(),
                key: key.to_string(),
                size: data.len() as u64,
                etag: checksum_bytes(&data),
            };
            inner.objects.insert(key.to_string(), data);
            Ok(info)
        })
    }
}
