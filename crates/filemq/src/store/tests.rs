use super::{
    file::{DurableWrite, claim, contended, fetch_request_from_file, write_durably},
    worker::WorkerContext,
    *,
};
use crate::{Error, Result};
use core::time::Duration;
use std::{
    collections::HashSet,
    fs::{self, File},
    io::{self, Write},
    path::Path,
    sync::Arc,
    time::SystemTime,
};
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

fn open_store(dir: &TempDir, peers: usize) -> Result<Store> {
    Store::open(
        StoreConfig::new(dir.path())
            .with_workers(4)
            .with_peers(peers)
            .with_max_jitter(Duration::from_millis(1))
            .with_shutdown_timeout(Duration::from_secs(1)),
    )
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

/// Writes at most `limit` bytes, then reports a zero-length write.
struct ShortWriter {
    inner: File,
    limit: usize,
}

impl Write for ShortWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = buf.len().min(self.limit);
        self.limit -= n;
        self.inner.write(&buf[..n])
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl DurableWrite for ShortWriter {
    fn sync(&mut self) -> io::Result<()> {
        self.inner.sync_all()
    }
}

#[tokio::test]
async fn open_creates_folders() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 0)?;

    for folder in [NEW_FOLDER, DELAY_FOLDER, QUEUES_FOLDER, REMOVE_FOLDER] {
        assert!(dir.path().join(folder).is_dir(), "missing {folder}");
    }

    // Reopening an existing root keeps it.
    store.shutdown().await?;
    let store = open_store(&dir, 0)?;
    store.shutdown().await
}

#[test]
fn open_rejects_bad_config() {
    let err = Store::open(StoreConfig::new("")).err().unwrap();
    assert!(matches!(err, Error::InvalidConfig { .. }));

    let dir = TempDir::new().unwrap();
    let err = Store::open(StoreConfig::new(dir.path()).with_workers(0))
        .err()
        .unwrap();
    assert!(matches!(err, Error::InvalidConfig { .. }));
}

#[tokio::test]
async fn queue_lifecycle() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 0)?;
    let queue = Queue::new("orders");

    assert!(!store.load_queue(&queue));
    store.save_queue(&queue)?;
    assert!(store.load_queue(&queue));

    // Idempotent in both directions.
    store.save_queue(&queue)?;
    assert!(store.load_queue(&queue));
    store.delete_queue(&queue)?;
    assert!(!store.load_queue(&queue));
    store.delete_queue(&queue)?;
    assert!(!store.load_queue(&queue));

    store.shutdown().await
}

#[tokio::test]
async fn save_writes_exact_payload_to_new() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 0)?;
    let queue = Queue::new("orders");
    let payload = b"{\"sku\":42,\"qty\":3}".to_vec();

    store
        .save_message(&queue, Message::new("m1", payload.clone()))
        .await?;

    let saved = fs::read(dir.path().join(NEW_FOLDER).join("orders:m1")).unwrap();
    assert_eq!(saved, payload);
    assert_eq!(store.stats().saved, 1);

    store.shutdown().await
}

#[tokio::test]
async fn save_empty_payload() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 0)?;

    store
        .save_message(&Queue::new("orders"), Message::new("m1", Vec::new()))
        .await?;

    let saved = fs::read(dir.path().join(NEW_FOLDER).join("orders:m1")).unwrap();
    assert!(saved.is_empty());

    store.shutdown().await
}

#[test]
fn truncated_write_leaves_no_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("orders:m1");
    let mut writer = ShortWriter {
        inner: File::create(&path).unwrap(),
        limit: 4,
    };

    let err = write_durably(&path, &mut writer, b"0123456789").unwrap_err();

    assert!(matches!(
        err,
        Error::PartialWrite {
            written: 4,
            expected: 10
        }
    ));
    assert!(!path.exists());
}

#[test]
fn full_write_is_kept() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("orders:m1");
    let mut writer = ShortWriter {
        inner: File::create(&path).unwrap(),
        limit: usize::MAX,
    };

    write_durably(&path, &mut writer, b"0123456789").unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"0123456789");
}

#[tokio::test]
async fn fetch_from_empty_queue_returns_none() -> Result<()> {
    for peers in [0, 2] {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, peers)?;
        let queue = Queue::new("orders");
        store.save_queue(&queue)?;

        assert_eq!(store.load_next_message(&queue).await?, None);
        // A queue that does not exist is just as empty.
        assert_eq!(store.load_next_message(&Queue::new("nope")).await?, None);
        assert_eq!(store.stats().empty, 2);

        store.shutdown().await?;
    }
    Ok(())
}

#[tokio::test]
async fn fetch_claims_into_delay() -> Result<()> {
    for peers in [0, 1] {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, peers)?;
        let queue = Queue::new("orders");
        store.save_queue(&queue)?;
        store
            .save_message(&queue, Message::new("m1", "hello"))
            .await?;

        // Not visible until the mover runs.
        assert_eq!(store.load_next_message(&queue).await?, None);

        store
            .layout()
            .transition(&queue, "m1", MessageState::New, MessageState::Available)
            .unwrap();

        let message = store.load_next_message(&queue).await?.unwrap();
        assert_eq!(message, Message::new("m1", "hello"));

        let delayed = fs::read(dir.path().join(DELAY_FOLDER).join("orders:m1")).unwrap();
        assert_eq!(delayed, b"hello");
        assert!(file_names(&store.layout().queue_path(&queue)).is_empty());
        assert_eq!(store.load_next_message(&queue).await?, None);
        assert_eq!(store.stats().delivered, 1);

        store.shutdown().await?;
    }
    Ok(())
}

#[tokio::test]
async fn delete_succeeds_once_from_any_folder() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 0)?;
    let queue = Queue::new("orders");
    store.save_queue(&queue)?;
    let layout = store.layout();

    for (id, state) in [
        ("a", MessageState::Available),
        ("d", MessageState::Delayed),
        ("n", MessageState::New),
    ] {
        fs::write(layout.message_path(state, &queue, id), id).unwrap();

        assert_eq!(store.delete_message(&queue, id)?, state);
        assert!(!layout.message_path(state, &queue, id).exists());
        let removed = layout.message_path(MessageState::PendingRemoval, &queue, id);
        assert_eq!(fs::read(removed).unwrap(), id.as_bytes());

        let err = store.delete_message(&queue, id).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    assert!(matches!(
        store.delete_message(&queue, "never-saved"),
        Err(Error::NotFound { .. })
    ));

    store.shutdown().await
}

#[tokio::test]
async fn delete_reports_rename_failures_as_io_errors() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 0)?;
    let queue = Queue::new("orders");
    store.save_queue(&queue)?;
    let layout = store.layout();

    let queued = layout.message_path(MessageState::Available, &queue, "m");
    fs::write(&queued, "payload").unwrap();
    let target = layout.message_path(MessageState::PendingRemoval, &queue, "m");
    fs::create_dir(&target).unwrap();
    fs::write(target.join("occupant"), "x").unwrap();

    let err = store.delete_message(&queue, "m").unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "{err}");
    assert_eq!(fs::read(&queued).unwrap(), b"payload");

    store.shutdown().await
}

#[tokio::test]
async fn delete_prefers_the_queue_copy() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 0)?;
    let queue = Queue::new("orders");
    store.save_queue(&queue)?;
    let layout = store.layout();

    // A stray copy in `new` must survive; only the first hit moves.
    fs::write(layout.message_path(MessageState::Available, &queue, "m"), "q").unwrap();
    fs::write(layout.message_path(MessageState::New, &queue, "m"), "n").unwrap();

    assert_eq!(store.delete_message(&queue, "m")?, MessageState::Available);
    assert!(layout.message_path(MessageState::New, &queue, "m").exists());

    store.shutdown().await
}

#[test]
fn claim_of_vanished_file_is_a_lost_race() {
    let dir = TempDir::new().unwrap();
    let layout = Layout::new(dir.path());
    layout.prepare().unwrap();
    let queue = Queue::new("orders");
    fs::create_dir(layout.queue_path(&queue)).unwrap();

    assert_eq!(claim(&layout, &queue, "gone"), FetchOutcome::RaceLost);
}

#[test]
fn claim_after_peer_rename_is_a_duplicate_delivery() {
    let dir = TempDir::new().unwrap();
    let layout = Layout::new(dir.path());
    layout.prepare().unwrap();
    let queue = Queue::new("orders");
    fs::create_dir(layout.queue_path(&queue)).unwrap();
    fs::write(
        layout.message_path(MessageState::Available, &queue, "m1"),
        "payload",
    )
    .unwrap();

    // Occupy the claim target so the rename fails after the open succeeded.
    let target = layout.message_path(MessageState::Delayed, &queue, "m1");
    fs::create_dir(&target).unwrap();
    fs::write(target.join("peer"), "x").unwrap();

    assert_eq!(
        claim(&layout, &queue, "m1"),
        FetchOutcome::Duplicate(Message::new("m1", "payload"))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn peers_sharing_a_root_deliver_every_message() -> Result<()> {
    const MESSAGES: usize = 200;

    let dir = TempDir::new().unwrap();
    let a = open_store(&dir, 1)?;
    let b = open_store(&dir, 1)?;
    let queue = Queue::new("orders");
    a.save_queue(&queue)?;

    let mut expected = HashSet::new();
    for i in 0..MESSAGES {
        let id = format!("m{i:04}");
        fs::write(
            a.layout().message_path(MessageState::Available, &queue, &id),
            &id,
        )
        .unwrap();
        expected.insert(id);
    }

    async fn drain(store: &Store, queue: &Queue) -> Result<Vec<Message>> {
        let mut delivered = Vec::new();
        while !file_names(&store.layout().queue_path(queue)).is_empty() {
            if let Some(message) = store.load_next_message(queue).await? {
                delivered.push(message);
            }
        }
        Ok(delivered)
    }

    let (from_a, from_b) = tokio::join!(drain(&a, &queue), drain(&b, &queue));
    let delivered: Vec<_> = from_a?.into_iter().chain(from_b?).collect();

    for message in &delivered {
        assert_eq!(message.content, message.id.as_bytes());
    }
    let ids: HashSet<_> = delivered.into_iter().map(|m| m.id).collect();
    assert_eq!(ids, expected);

    // Every file is renamed into `delay` exactly once; anything beyond that
    // was a duplicate delivery.
    let (sa, sb) = (a.stats(), b.stats());
    assert_eq!(
        sa.delivered + sb.delivered - sa.duplicate_deliveries - sb.duplicate_deliveries,
        MESSAGES as u64
    );
    assert_eq!(file_names(a.layout().delay_folder()).len(), MESSAGES);

    a.shutdown().await?;
    b.shutdown().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_fetches_on_one_store_deliver_each_message_once() -> Result<()> {
    const MESSAGES: usize = 300;
    const TASKS: usize = 16;

    for peers in [0, 2] {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(open_store(&dir, peers)?);
        let queue = Queue::new("orders");
        store.save_queue(&queue)?;

        let mut expected = HashSet::new();
        for i in 0..MESSAGES {
            let id = format!("m{i:04}");
            fs::write(
                store
                    .layout()
                    .message_path(MessageState::Available, &queue, &id),
                &id,
            )
            .unwrap();
            expected.insert(id);
        }

        let mut tasks = Vec::with_capacity(TASKS);
        for _ in 0..TASKS {
            let store = Arc::clone(&store);
            let queue = queue.clone();
            tasks.push(tokio::spawn(async move {
                let mut delivered = Vec::new();
                while !file_names(&store.layout().queue_path(&queue)).is_empty() {
                    if let Some(message) = store.load_next_message(&queue).await? {
                        delivered.push(message.id);
                    }
                }
                Ok::<_, Error>(delivered)
            }));
        }

        let mut delivered = Vec::new();
        for task in tasks {
            delivered.extend(task.await.unwrap()?);
        }

        let unique: HashSet<_> = delivered.iter().cloned().collect();
        assert_eq!(delivered.len(), MESSAGES, "peers={peers}");
        assert_eq!(unique, expected, "peers={peers}");

        let stats = store.stats();
        assert_eq!(stats.delivered, MESSAGES as u64, "peers={peers}");
        assert_eq!(stats.duplicate_deliveries, 0, "peers={peers}");
        assert_eq!(stats.races_lost, 0, "peers={peers}");

        store.shutdown().await?;
    }
    Ok(())
}

#[test]
fn small_listings_are_contended_only_with_jitter() {
    let jittered = FetchPolicy {
        peers: 2,
        max_jitter: Duration::from_millis(5),
    };
    assert!(contended(1, jittered));
    assert!(contended(2, jittered));
    assert!(!contended(3, jittered));

    let steady = FetchPolicy {
        max_jitter: Duration::ZERO,
        ..jittered
    };
    assert!(!contended(1, steady));
}

#[test]
fn contended_fetch_still_delivers() {
    let dir = TempDir::new().unwrap();
    let layout = Layout::new(dir.path());
    layout.prepare().unwrap();
    let queue = Queue::new("orders");
    fs::create_dir(layout.queue_path(&queue)).unwrap();
    fs::write(layout.message_path(MessageState::Available, &queue, "m1"), "a").unwrap();

    let policy = FetchPolicy {
        peers: 2,
        max_jitter: Duration::from_millis(20),
    };
    assert_eq!(
        fetch_request_from_file(&layout, &queue, policy),
        FetchOutcome::Delivered(Message::new("m1", "a"))
    );
    assert!(layout.message_path(MessageState::Delayed, &queue, "m1").exists());
    assert_eq!(
        fetch_request_from_file(&layout, &queue, policy),
        FetchOutcome::Empty
    );
}

#[test]
fn peers_pick_at_random_among_listed_candidates() {
    let dir = TempDir::new().unwrap();
    let layout = Layout::new(dir.path());
    layout.prepare().unwrap();
    let queue = Queue::new("orders");
    fs::create_dir(layout.queue_path(&queue)).unwrap();
    let candidates: HashSet<_> = ["a", "b", "c"].into_iter().collect();
    let policy = FetchPolicy {
        peers: 2,
        max_jitter: Duration::ZERO,
    };

    let mut picked = HashSet::new();
    for _ in 0..60 {
        for id in &candidates {
            fs::write(layout.message_path(MessageState::Available, &queue, id), id).unwrap();
        }
        match fetch_request_from_file(&layout, &queue, policy) {
            FetchOutcome::Delivered(message) => {
                assert!(candidates.contains(message.id.as_str()), "{}", message.id);
                assert_eq!(message.content, message.id.as_bytes());
                picked.insert(message.id);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    // Three equally likely picks over sixty rounds.
    assert!(picked.len() > 1, "always picked {picked:?}");
}

#[tokio::test]
async fn claim_restamps_the_visibility_clock() -> Result<()> {
    for peers in [0, 1] {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, peers)?;
        let queue = Queue::new("orders");
        store.save_queue(&queue)?;
        let layout = store.layout();

        let queued = layout.message_path(MessageState::Available, &queue, "m1");
        fs::write(&queued, "a").unwrap();
        let two_hours_ago = SystemTime::now() - Duration::from_secs(2 * 3600);
        File::options()
            .write(true)
            .open(&queued)
            .unwrap()
            .set_modified(two_hours_ago)
            .unwrap();

        assert!(store.load_next_message(&queue).await?.is_some());

        let delayed = layout.message_path(MessageState::Delayed, &queue, "m1");
        let age = fs::metadata(&delayed)
            .unwrap()
            .modified()
            .unwrap()
            .elapsed()
            .unwrap_or_default();
        assert!(age < Duration::from_secs(60), "peers={peers} age={age:?}");

        // Measured from the claim, not from the save.
        assert_eq!(layout.requeue_delayed(Duration::from_secs(3600))?, 0);
        assert!(delayed.exists());

        store.shutdown().await?;
    }
    Ok(())
}

#[tokio::test]
async fn empty_pool_refuses_work() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let ctx = WorkerContext {
        kind: PoolKind::Fetcher,
        layout: Arc::new(Layout::new(dir.path())),
        fetch: FetchPolicy {
            peers: 0,
            max_jitter: Duration::ZERO,
        },
    };
    let fetch = |queue: &str| {
        let (response, _rx) = oneshot::channel();
        WorkRequest::Fetch {
            queue: Queue::new(queue),
            response,
        }
    };

    let empty = WorkerPool::spawn(0, &ctx, CancellationToken::new(), Duration::from_secs(1))?;
    assert!(empty.is_empty());
    assert_eq!(empty.pinned_worker_index("orders"), 0);
    assert_eq!(empty.next_worker_index(), 0);
    assert!(matches!(
        empty.send_pinned("orders", fetch("orders")).await,
        Err(Error::ChannelError { .. })
    ));
    assert!(matches!(
        empty.send_to_next_worker(fetch("orders")).await,
        Err(Error::ChannelError { .. })
    ));

    let pool = WorkerPool::spawn(2, &ctx, CancellationToken::new(), Duration::from_secs(1))?;
    assert!(matches!(
        pool.send_to_worker(5, fetch("orders")).await,
        Err(Error::ChannelError { .. })
    ));
    pool.shutdown().await
}

#[test]
fn pinning_is_stable() {
    assert_eq!(pinned_worker("", 4), 0);
    assert_eq!(pinned_worker("orders", 0), 0);
    for queue in ["orders", "invoices", "audit"] {
        let first = pinned_worker(queue, 8);
        assert!(first < 8);
        assert_eq!(first, pinned_worker(queue, 8));
        assert_eq!(
            first,
            crc32fast::hash(queue.as_bytes()) as usize % 8,
            "pinning must be crc32 mod workers"
        );
    }
}

#[tokio::test]
async fn shutdown_refuses_new_work() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 0)?;
    let queue = Queue::new("orders");
    store.save_queue(&queue)?;
    store.shutdown().await?;

    let err = store
        .save_message(&queue, Message::new("m1", "late"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ServiceShutdown));

    let err = store.load_next_message(&queue).await.unwrap_err();
    assert!(matches!(err, Error::ServiceShutdown));

    // Queue management does not go through the pools.
    assert!(store.load_queue(&queue));
    Ok(())
}

#[tokio::test]
async fn promote_queues_saved_messages() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 0)?;
    let queue = Queue::new("orders");
    store.save_queue(&queue)?;
    store.save_message(&queue, Message::new("m1", "a")).await?;
    store.save_message(&queue, Message::new("m2", "b")).await?;

    // Too fresh to be queued.
    assert_eq!(store.layout().promote_new(Duration::from_secs(3600))?, 0);

    assert_eq!(store.layout().promote_new(Duration::ZERO)?, 2);
    assert_eq!(
        file_names(&store.layout().queue_path(&queue)),
        vec!["m1", "m2"]
    );
    assert!(file_names(store.layout().new_folder()).is_empty());

    store.shutdown().await
}

#[tokio::test]
async fn requeue_redelivers_expired_claims() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 0)?;
    let queue = Queue::new("orders");
    store.save_queue(&queue)?;
    store.save_message(&queue, Message::new("m1", "a")).await?;
    store.layout().promote_new(Duration::ZERO)?;

    assert!(store.load_next_message(&queue).await?.is_some());
    assert_eq!(store.load_next_message(&queue).await?, None);

    // Claimed just now, still within its visibility timeout.
    assert_eq!(store.layout().requeue_delayed(Duration::from_secs(3600))?, 0);

    assert_eq!(store.layout().requeue_delayed(Duration::ZERO)?, 1);
    let again = store.load_next_message(&queue).await?.unwrap();
    assert_eq!(again, Message::new("m1", "a"));

    store.shutdown().await
}

#[tokio::test]
async fn sweeps_route_orphans_of_deleted_queues_to_remove() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 0)?;
    let queue = Queue::new("orders");
    store.save_queue(&queue)?;
    store.save_message(&queue, Message::new("m1", "a")).await?;
    store.save_message(&queue, Message::new("m2", "b")).await?;
    store
        .layout()
        .transition(&queue, "m2", MessageState::New, MessageState::Delayed)
        .unwrap();

    store.delete_queue(&queue)?;

    assert_eq!(store.layout().promote_new(Duration::ZERO)?, 0);
    assert_eq!(store.layout().requeue_delayed(Duration::ZERO)?, 0);
    assert_eq!(
        file_names(store.layout().remove_folder()),
        vec!["orders:m1", "orders:m2"]
    );

    assert_eq!(store.layout().reap()?, 2);
    assert!(file_names(store.layout().remove_folder()).is_empty());

    store.shutdown().await
}

#[test]
fn sweeps_skip_malformed_names() {
    let dir = TempDir::new().unwrap();
    let layout = Layout::new(dir.path());
    layout.prepare().unwrap();
    fs::write(layout.new_folder().join("no-separator"), "x").unwrap();
    fs::write(layout.new_folder().join(":m1"), "x").unwrap();

    assert_eq!(layout.promote_new(Duration::ZERO).unwrap(), 0);
    assert_eq!(file_names(layout.new_folder()).len(), 2);
}

#[test]
fn scoped_names_split_at_the_first_separator() {
    let queue = Queue::new("orders");
    assert_eq!(scoped_name(&queue, "m1"), "orders:m1");

    let (queue, id) = split_scoped_name("orders:m:1").unwrap();
    assert_eq!(queue.id, "orders");
    assert_eq!(id, "m:1");

    assert!(split_scoped_name("orders").is_none());
    assert!(split_scoped_name("orders:").is_none());
    assert!(split_scoped_name(":m1").is_none());
}
