use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use ethash_dag::{
    get_cache_size, get_full_size, get_seedhash, BoxError, DagConfig, DagService, Epoch,
    EpochCalculator, Error, ErrorKind, HeightSource, SeedHashCache,
};
use ethereum_types::H256;
use hex_literal::hex;
use proptest::prelude::*;

const SEED_1: [u8; 32] = hex!("290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563");
const SEED_2: [u8; 32] = hex!("510e4e770828ddbf7f7b00ab00a9f6adaf81c0dc9cc85f1f8249c256942d61d9");

struct Chain(AtomicU64);

impl HeightSource for Chain {
    fn current_height(&self) -> ethash_dag::Result<u64> {
        Ok(self.0.load(Ordering::SeqCst))
    }
}

struct Offline;

impl HeightSource for Offline {
    fn current_height(&self) -> ethash_dag::Result<u64> {
        Err(Error::UpstreamUnavailable("rpc timeout".into()))
    }
}

fn zeroes(_: Epoch, _: H256, size: u64) -> Result<Bytes, BoxError> {
    Ok(Bytes::from(vec![0u8; size as usize]))
}

fn service(heights: Arc<dyn HeightSource>) -> DagService {
    DagService::from_config(&DagConfig::default(), heights, Arc::new(zeroes)).unwrap()
}

#[test]
fn seed_chain() {
    assert_eq!(get_seedhash(Epoch::new(0)), H256::zero());
    assert_eq!(get_seedhash(Epoch::new(1)), H256::from(SEED_1));
    assert_eq!(get_seedhash(Epoch::new(2)), H256::from(SEED_2));

    let cache = SeedHashCache::default();
    assert_eq!(cache.seed_hash(Epoch::new(2)), H256::from(SEED_2));
    assert_eq!(cache.seed_hash(Epoch::new(1)), H256::from(SEED_1));
}

#[test]
fn seed_cache_is_order_independent() {
    let forward = SeedHashCache::default();
    let backward = SeedHashCache::default();
    let a: Vec<_> = (0..40).map(|e| forward.seed_hash(Epoch::new(e))).collect();
    let mut b: Vec<_> = (0..40).rev().map(|e| backward.seed_hash(Epoch::new(e))).collect();
    b.reverse();
    assert_eq!(a, b);
    assert_eq!(a[39], get_seedhash(Epoch::new(39)));
    for e in 1..40 {
        assert_eq!(
            a[e],
            H256::from(ethash_dag::keccak_256(a[e - 1].as_bytes()))
        );
    }
}

#[test]
fn concurrent_seed_queries_agree() {
    let cache = Arc::new(SeedHashCache::with_checkpoint_interval(3).unwrap());
    let expected = get_seedhash(Epoch::new(64));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let mid = cache.seed_hash(Epoch::new(8 * i));
                (mid, cache.seed_hash(Epoch::new(64)))
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let (mid, last) = handle.join().unwrap();
        assert_eq!(mid, get_seedhash(Epoch::new(8 * i as u64)));
        assert_eq!(last, expected);
    }
}

#[test]
fn canonical_epoch_zero() {
    let service = service(Arc::new(Chain(AtomicU64::new(0))));
    let info = service.get_dag_info(Epoch::new(0)).unwrap();
    assert_eq!(info.epoch, Epoch::new(0));
    assert_eq!(info.seedhash, H256::zero());
    assert_eq!(info.size, 1_073_739_904);
    assert_eq!(info.cache_size, 16_776_896);
    assert_eq!(info.size, get_full_size(Epoch::new(0)).unwrap());
    assert_eq!(info.cache_size, get_cache_size(Epoch::new(0)).unwrap());

    let cache = service.get_cache_info(Epoch::new(0)).unwrap();
    assert_eq!(cache.size, 16_776_896);
    assert_eq!(cache.seedhash, H256::zero());
}

#[test]
fn defaults_to_chain_epoch() {
    let chain = Arc::new(Chain(AtomicU64::new(59_999)));
    let service = service(chain.clone());
    assert_eq!(service.get_epoch().unwrap(), Epoch::new(1));
    assert_eq!(service.get_seed_hash(None).unwrap(), H256::from(SEED_1));
    assert_eq!(service.get_dag_size(None).unwrap(), 1_082_130_304);
    assert_eq!(service.get_cache_size(None).unwrap(), 16_907_456);

    chain.0.store(60_000, Ordering::SeqCst);
    assert_eq!(service.get_seed_hash(None).unwrap(), H256::from(SEED_2));
    assert_eq!(
        service.get_dag_size(Some(Epoch::new(0))).unwrap(),
        1_073_739_904
    );
}

#[test]
fn upstream_errors_are_distinguishable() {
    let service = service(Arc::new(Offline));
    let err = service.get_epoch().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
    assert!(err.is_retryable());
    assert_eq!(
        service.get_dag_size(None).unwrap_err().kind(),
        ErrorKind::UpstreamUnavailable
    );
    // explicit epochs don't need the chain
    assert!(service.get_dag_size(Some(Epoch::new(3))).is_ok());
}

#[test]
fn invalid_arguments() {
    let err = "-1".parse::<Epoch>().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(!err.is_retryable());
    assert_eq!(
        "1.5".parse::<Epoch>().unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
    assert_eq!(
        EpochCalculator::default().epoch_of(-1i64).unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
}

#[test]
fn overflow_is_reported() {
    let service = service(Arc::new(Chain(AtomicU64::new(0))));
    let err = service.get_dag_info(Epoch::new(u64::MAX)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Overflow);
    let err = service.get_seed_hash(Some(Epoch::new(u64::MAX))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Overflow);

    // far past the bound but small enough that no size arithmetic overflows
    let far = Epoch::new(1 << 42);
    let err = service.get_cache_info(far).unwrap_err();
    assert!(matches!(
        err,
        Error::Overflow {
            what: "epoch bound",
            ..
        }
    ));
    assert_eq!(
        service.get_seed_hash(Some(far)).unwrap_err().kind(),
        ErrorKind::Overflow
    );
    assert_eq!(
        service.get_cache_size(Some(far)).unwrap_err().kind(),
        ErrorKind::Overflow
    );
    let last = Epoch::new(ethash_dag::MAX_EPOCH);
    assert_eq!(service.get_cache_info(last).unwrap().epoch, last);
    assert_eq!(
        get_full_size(Epoch::new(u64::MAX - 7)).unwrap_err().kind(),
        ErrorKind::Overflow
    );
}

#[test]
fn active_dag_through_service() {
    let config = DagConfig::from_toml_str(
        r#"
        [schedule]
        epoch_length = 100
        dataset_bytes_init = 8192
        dataset_bytes_growth = 512
        cache_bytes_init = 2048
        cache_bytes_growth = 128
        "#,
    )
    .unwrap();
    let chain = Arc::new(Chain(AtomicU64::new(250)));
    let service = DagService::from_config(&config, chain, Arc::new(zeroes)).unwrap();
    assert_eq!(
        service.get_active_dag().unwrap_err().kind(),
        ErrorKind::NoneLoaded
    );

    service.registry().init(service.heights()).unwrap();
    let active = service.get_active_dag().unwrap();
    assert_eq!(active.epoch, Epoch::new(2));
    assert_eq!(active.seedhash, H256::from(SEED_2));
    assert_eq!(
        active.size,
        service.get_dag_size(Some(Epoch::new(2))).unwrap()
    );

    // historical descriptors bypass the registry
    let old = service.get_dag_info(Epoch::new(0)).unwrap();
    assert_eq!(old.seedhash, H256::zero());
    assert_eq!(service.registry().active_epoch(), Some(Epoch::new(2)));
}

#[test]
fn epoch_table() {
    let calc = EpochCalculator::default();
    assert_eq!(calc.epoch_of(0u64).unwrap(), Epoch::new(0));
    assert_eq!(calc.epoch_of(30_000u64).unwrap(), Epoch::new(1));
    assert_eq!(calc.epoch_of(59_999u64).unwrap(), Epoch::new(1));
}

proptest! {
    #[test]
    fn epoch_is_monotonic(a in any::<u64>(), b in any::<u64>()) {
        let calc = EpochCalculator::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(calc.epoch_of(lo).unwrap() <= calc.epoch_of(hi).unwrap());
    }

    #[test]
    fn sizes_grow_and_cache_stays_smaller(a in 0u64..4096, b in 0u64..4096) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let (lo, hi) = (Epoch::new(lo), Epoch::new(hi));
        prop_assert!(get_full_size(lo).unwrap() <= get_full_size(hi).unwrap());
        prop_assert!(get_cache_size(lo).unwrap() <= get_cache_size(hi).unwrap());
        prop_assert!(get_cache_size(hi).unwrap() < get_full_size(hi).unwrap());
    }

    #[test]
    fn epoch_parse_accepts_non_negative(e in 0i64..i64::MAX) {
        prop_assert_eq!(
            e.to_string().parse::<Epoch>().unwrap(),
            Epoch::new(e as u64)
        );
    }
}
