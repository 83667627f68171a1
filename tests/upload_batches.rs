mod common;

use common::{limits, FakeTransport, MIB};
use fb_client::batch::UploadItem;
use fb_client::config::Thresholds;
use fb_client::error::FbError;
use fb_client::limits::LimitsCache;
use fb_client::progress::ProgressAggregator;
use fb_client::upload::Uploader;

fn local_items(count: usize, size: u64) -> Vec<UploadItem> {
    (0..count)
        .map(|n| UploadItem::with_size(format!("/data/file{}.bin", n), size))
        .collect()
}

fn upload(transport: &FakeTransport, cache: &LimitsCache, items: &mut [UploadItem]) -> fb_client::Result<()> {
    let mut uploader = Uploader::new(
        transport,
        cache,
        Thresholds::default(),
        ProgressAggregator::new(false),
    );
    uploader.upload(items)
}

#[test]
fn twelve_files_are_sent_in_three_requests() {
    let transport = FakeTransport::with_limits(limits(40 * MIB, 100 * MIB, 5, 1000));
    let cache = LimitsCache::new();
    let mut items = local_items(12, MIB);

    upload(&transport, &cache, &mut items).unwrap();

    assert_eq!(transport.upload_sizes(), vec![5, 5, 2]);
    assert_eq!(transport.limits_calls.get(), 1);

    let ids: Vec<&str> = items.iter().filter_map(UploadItem::id).collect();
    let expected: Vec<String> = (0..12).map(|n| format!("id{}", n)).collect();
    assert_eq!(ids, expected);
    assert_eq!(items[11].url(), Some("https://paste.test/id11/"));

    let sent: Vec<_> = transport.uploads.borrow().concat();
    let paths: Vec<_> = items.iter().filter_map(|i| i.path().map(|p| p.to_path_buf())).collect();
    assert_eq!(sent, paths);
}

#[test]
fn oversized_file_fails_before_any_upload() {
    let transport = FakeTransport::with_limits(limits(40 * MIB, 100 * MIB, 5, 1000));
    let cache = LimitsCache::new();
    let mut items = local_items(1, 50 * MIB);

    let err = upload(&transport, &cache, &mut items).unwrap_err();

    assert!(matches!(err, FbError::FileTooBig { .. }));
    assert_eq!(err.kind(), "client-internal/file-too-big");
    assert!(transport.uploads.borrow().is_empty());
    assert!(items[0].id().is_none());
}

#[test]
fn short_response_aborts_remaining_batches() {
    let mut transport = FakeTransport::with_limits(limits(40 * MIB, 100 * MIB, 5, 1000));
    transport.short_response_on = Some(0);
    let cache = LimitsCache::new();
    let mut items = local_items(10, MIB);

    let err = upload(&transport, &cache, &mut items).unwrap_err();

    assert!(matches!(err, FbError::Protocol { .. }));
    assert_eq!(transport.upload_sizes(), vec![5]);
    assert!(items.iter().all(|item| item.id().is_none()));
}

#[test]
fn earlier_batches_stay_assigned_after_a_failure() {
    let mut transport = FakeTransport::with_limits(limits(40 * MIB, 100 * MIB, 5, 1000));
    transport.short_response_on = Some(1);
    let cache = LimitsCache::new();
    let mut items = local_items(12, MIB);

    assert!(upload(&transport, &cache, &mut items).is_err());

    assert_eq!(transport.upload_sizes(), vec![5, 5]);
    assert!(items[..5].iter().all(|item| item.id().is_some()));
    assert!(items[5..].iter().all(|item| item.id().is_none()));
}

#[test]
fn small_uploads_skip_the_limits_fetch() {
    let transport = FakeTransport::default();
    let cache = LimitsCache::new();
    let mut items = local_items(3, MIB);

    upload(&transport, &cache, &mut items).unwrap();

    assert_eq!(transport.limits_calls.get(), 0);
    assert_eq!(transport.upload_sizes(), vec![3]);
}

#[test]
fn hosted_items_are_not_uploaded() {
    let transport = FakeTransport::default();
    let cache = LimitsCache::new();
    let mut items = vec![
        UploadItem::hosted("existing"),
        UploadItem::with_size("/data/a.txt", 10),
        UploadItem::with_size("/data/b.txt", 20),
    ];

    upload(&transport, &cache, &mut items).unwrap();

    assert_eq!(transport.upload_sizes(), vec![2]);
    assert_eq!(items[0].id(), Some("existing"));
    assert_eq!(items[0].url(), None);
    assert_eq!(items[1].id(), Some("id0"));
    assert_eq!(items[2].id(), Some("id1"));
}

#[test]
fn limits_fetch_failure_aborts_the_upload() {
    let transport = FakeTransport::default();
    let cache = LimitsCache::new();
    let mut items = local_items(8, MIB);

    let err = upload(&transport, &cache, &mut items).unwrap_err();

    assert_eq!(err.kind(), "file/config-unavailable");
    assert!(transport.uploads.borrow().is_empty());
}

#[test]
fn limits_are_fetched_once_per_cache() {
    let transport = FakeTransport::with_limits(limits(40 * MIB, 100 * MIB, 5, 1000));
    let cache = LimitsCache::new();

    let first = *cache.fetch(&transport).unwrap();
    let second = *cache.fetch(&transport).unwrap();
    assert_eq!(first, second);
    assert_eq!(transport.limits_calls.get(), 1);

    let mut items = local_items(7, MIB);
    upload(&transport, &cache, &mut items).unwrap();
    assert_eq!(transport.limits_calls.get(), 1);
    assert_eq!(transport.upload_sizes(), vec![5, 2]);
}

#[test]
fn progress_is_fed_for_every_batch() {
    let transport = FakeTransport::with_limits(limits(40 * MIB, 100 * MIB, 5, 1000));
    let cache = LimitsCache::new();
    let mut items = local_items(6, MIB);

    upload(&transport, &cache, &mut items).unwrap();

    assert_eq!(*transport.progress_seen.borrow(), vec![0, 512, 1024, 0, 512, 1024]);
}

#[test]
fn interrupt_stops_later_batches_and_clears_progress() {
    let mut transport = FakeTransport::with_limits(limits(40 * MIB, 100 * MIB, 5, 1000));
    transport.interrupt_on = Some(1);
    let cache = LimitsCache::new();
    let mut items = local_items(12, MIB);

    let mut uploader = Uploader::new(
        &transport,
        &cache,
        Thresholds::default(),
        ProgressAggregator::new(false),
    );
    let err = uploader.upload(&mut items).unwrap_err();

    assert!(err.is_interrupted());
    assert_eq!(err.kind(), "client-internal/interrupted");
    assert_eq!(transport.upload_sizes(), vec![5, 5]);
    assert!(items[..5].iter().all(|item| item.id().is_some()));
    assert!(items[5..].iter().all(|item| item.id().is_none()));
    assert!(uploader.progress().state().is_none());
}

#[test]
fn progress_is_cleared_after_a_successful_upload() {
    let transport = FakeTransport::with_limits(limits(40 * MIB, 100 * MIB, 5, 1000));
    let cache = LimitsCache::new();
    let mut items = local_items(6, MIB);

    let mut uploader = Uploader::new(
        &transport,
        &cache,
        Thresholds::default(),
        ProgressAggregator::new(false),
    );
    uploader.upload(&mut items).unwrap();

    assert_eq!(transport.upload_sizes(), vec![5, 1]);
    assert!(uploader.progress().state().is_none());
}
