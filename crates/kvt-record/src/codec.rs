use std::sync::Arc;

use kvt_codec::{validate_bin_names, BinSink, Transcoder};
use kvt_types::{
    CodecError, CodecResult, DynamicValue, SerializerPolicy, StoreFeatures,
};
use tracing::debug;

use crate::key::{key_to_dynamic_with_policy, Key};
use crate::record::{Bin, GetOptions, Record, RecordMeta, WriteMeta};
use crate::store::RecordStore;

const FIELD_KEY: &str = "key";
const FIELD_METADATA: &str = "metadata";
const FIELD_BINS: &str = "bins";

/// Record-level transcoding on top of the container walker and key codec.
///
/// Writes turn a dynamic bins map into record bins and hand them to the
/// [`RecordStore`]; reads turn the stored record back into a
/// `{key, metadata, bins}` envelope.
pub struct RecordCodec {
    transcoder: Arc<Transcoder>,
    store: Arc<dyn RecordStore>,
}

impl RecordCodec {
    pub fn new(transcoder: Arc<Transcoder>, store: Arc<dyn RecordStore>) -> Self {
        Self { transcoder, store }
    }

    pub fn transcoder(&self) -> &Transcoder {
        &self.transcoder
    }

    /// Convert a dynamic `{bin name: value}` map into record bins.
    ///
    /// The map must be non-empty and its names valid; both are checked before
    /// any pool is created.
    pub fn encode_bins(
        &self,
        bins: &DynamicValue,
        features: StoreFeatures,
        policy: SerializerPolicy,
    ) -> CodecResult<Vec<Bin>> {
        let entries = bins.as_map().ok_or_else(|| {
            CodecError::parameter(format!("bins must be a map, found {}", bins.kind_name()))
        })?;
        if entries.is_empty() {
            return Err(CodecError::parameter(
                "record must be given at least one bin => value pair",
            ));
        }
        validate_bin_names(entries)?;

        let mut pool = self.transcoder.new_pool(entries.len());
        let mut sink = BinSink::with_capacity(entries.len());
        // Bin values sit at level 1, so the bins map itself is level 0.
        self.transcoder
            .walker(features, policy)
            .encode_container(bins, &mut sink, &mut pool, 0)?;

        let mut out = Vec::with_capacity(sink.len());
        for (name, root) in sink.into_bins() {
            let value = pool.take(root)?;
            out.push(Bin { name, value });
        }
        debug!(bins = out.len(), nodes = pool.len(), "record bins encoded");
        Ok(out)
    }

    /// Convert `bins` and write them under `key`.
    ///
    /// Store capabilities are read once for the whole record. A `None` policy
    /// falls back to the configured default serializer.
    pub fn put_record(
        &self,
        bins: &DynamicValue,
        key: &Key,
        meta: WriteMeta,
        policy: Option<SerializerPolicy>,
    ) -> CodecResult<()> {
        let features = self.store.features();
        let policy = self.transcoder.policy_or_default(policy);
        let bins = self
            .encode_bins(bins, features, policy)
            .map_err(|e| e.context(format!("put {key}")))?;
        let record = Record::new(
            key.clone(),
            RecordMeta {
                ttl: meta.ttl,
                generation: 0,
            },
            bins,
        );
        self.store.put(key, &record, &meta)?;
        debug!(key = %key, bins = record.bins.len(), ttl = meta.ttl, "record written");
        Ok(())
    }

    /// Read the record under `key` and render it as a dynamic envelope.
    ///
    /// A bin filter is validated before the store is contacted.
    pub fn get_record(&self, key: &Key, options: &GetOptions) -> CodecResult<DynamicValue> {
        let filter = options.bins.as_ref().map(bin_filter).transpose()?;
        let record = self.store.get(key, filter.as_deref())?;
        debug!(key = %key, bins = record.bins.len(), "record read");
        self.render_record(record, options)
    }

    /// Render a stored record as `{key, metadata, bins}`.
    pub fn render_record(&self, record: Record, options: &GetOptions) -> CodecResult<DynamicValue> {
        let config = self.transcoder.config();
        let key_policy = options.key_policy.unwrap_or(config.key_policy);
        let walker = self
            .transcoder
            .walker(StoreFeatures::default(), config.default_serializer);

        let mut bins = Vec::with_capacity(record.bins.len());
        for Bin { name, value } in record.bins {
            let value = walker
                .decode_value(value, 1)
                .map_err(|e| e.context(format!("bin '{name}'")))?;
            bins.push((DynamicValue::String(name), value));
        }

        let metadata = if options.with_metadata {
            DynamicValue::map([
                ("ttl", DynamicValue::Int(i64::from(record.meta.ttl))),
                ("generation", DynamicValue::Int(i64::from(record.meta.generation))),
            ])
        } else {
            DynamicValue::Null
        };

        Ok(DynamicValue::map([
            (FIELD_KEY, key_to_dynamic_with_policy(&record.key, key_policy)),
            (FIELD_METADATA, metadata),
            (FIELD_BINS, DynamicValue::Map(bins)),
        ]))
    }
}

/// Validate a dynamic bin filter: a list whose every element is a string.
fn bin_filter(value: &DynamicValue) -> CodecResult<Vec<String>> {
    let items = value.as_list().ok_or_else(|| {
        CodecError::parameter(format!("bin filter must be a list, found {}", value.kind_name()))
    })?;
    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                CodecError::parameter(format!(
                    "bin names must be strings, found {}",
                    item.kind_name()
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use kvt_codec::{CodecConfig, SerializerRegistry};
    use kvt_types::{ErrorKind, KeyPolicy, OpaqueObject, StoreValue};
    use serde_json::json;

    use crate::error::{StoreResult, STATUS_GENERATION, STATUS_NOT_FOUND};
    use crate::key::{build_key, KeyIdentity};
    use crate::memory::InMemoryRecordStore;
    use crate::record::GenerationPolicy;

    fn setup() -> (RecordCodec, Arc<InMemoryRecordStore>) {
        let store = Arc::new(InMemoryRecordStore::new());
        let codec = RecordCodec::new(Arc::new(Transcoder::default()), store.clone());
        (codec, store)
    }

    fn user_key(id: i64) -> Key {
        build_key("test", "users", KeyIdentity::Integer(id)).unwrap()
    }

    fn bins(value: serde_json::Value) -> DynamicValue {
        DynamicValue::from_json(value)
    }

    /// Store that counts calls and never holds data.
    #[derive(Default)]
    struct CountingStore {
        puts: AtomicUsize,
        gets: AtomicUsize,
    }

    impl RecordStore for CountingStore {
        fn features(&self) -> StoreFeatures {
            StoreFeatures::full()
        }

        fn put(&self, _key: &Key, _record: &Record, _meta: &WriteMeta) -> StoreResult<()> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn get(&self, key: &Key, _bins: Option<&[String]>) -> StoreResult<Record> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            Ok(Record::new(key.clone(), RecordMeta::default(), vec![]))
        }
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    #[test]
    fn put_then_get_roundtrip() {
        let (codec, _) = setup();
        let key = user_key(1);
        let input = bins(json!({"name": "alice", "age": 30, "tags": ["a", "b"], "score": 9.5}));
        codec.put_record(&input, &key, WriteMeta::with_ttl(60), None).unwrap();

        let out = codec.get_record(&key, &GetOptions::default()).unwrap();
        assert_eq!(out.get("bins"), Some(&input));
        let meta = out.get("metadata").unwrap();
        assert_eq!(meta.get("ttl"), Some(&DynamicValue::Int(60)));
        assert_eq!(meta.get("generation"), Some(&DynamicValue::Int(1)));
    }

    #[test]
    fn empty_bins_are_rejected_before_the_store() {
        let store = Arc::new(CountingStore::default());
        let codec = RecordCodec::new(Arc::new(Transcoder::default()), store.clone());
        let err = codec
            .put_record(&DynamicValue::Map(vec![]), &user_key(1), WriteMeta::default(), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
        assert!(err.message().contains("at least one bin"));
        assert_eq!(store.puts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn bins_must_be_a_map() {
        let (codec, _) = setup();
        let err = codec
            .encode_bins(&DynamicValue::List(vec![1.into()]), StoreFeatures::full(), SerializerPolicy::Builtin)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
    }

    #[test]
    fn invalid_bin_name_is_parameter_error() {
        let (codec, store) = setup();
        let err = codec
            .put_record(&bins(json!({"this-name-is-too-long": 1})), &user_key(1), WriteMeta::default(), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
        assert!(store.is_empty());
    }

    #[test]
    fn opaque_bin_under_none_policy_fails_whole_record() {
        let (codec, store) = setup();
        let input = DynamicValue::map([
            ("ok", 1.into()),
            ("obj", DynamicValue::Opaque(OpaqueObject::new("Thing", vec![]))),
        ]);
        let err = codec
            .put_record(&input, &user_key(1), WriteMeta::default(), Some(SerializerPolicy::None))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
        assert!(store.is_empty());
    }

    #[test]
    fn store_features_decide_double_encoding() {
        let store = Arc::new(InMemoryRecordStore::new().with_features(StoreFeatures::minimal()));
        let codec = RecordCodec::new(Arc::new(Transcoder::default()), store.clone());
        let key = user_key(2);
        codec.put_record(&bins(json!({"f": 1.5})), &key, WriteMeta::default(), None).unwrap();

        let raw = store.get(&key, None).unwrap();
        assert!(matches!(raw.bin("f"), Some(StoreValue::Bytes { .. })));
        let out = codec.get_record(&key, &GetOptions::default()).unwrap();
        assert_eq!(out.get("bins").unwrap().get("f"), Some(&DynamicValue::Float(1.5)));
    }

    #[test]
    fn generation_mismatch_is_server_error() {
        let (codec, _) = setup();
        let key = user_key(3);
        codec.put_record(&bins(json!({"a": 1})), &key, WriteMeta::default(), None).unwrap();
        let meta = WriteMeta {
            ttl: 0,
            generation: GenerationPolicy::ExpectEqual(5),
        };
        let err = codec.put_record(&bins(json!({"a": 2})), &key, meta, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(err.status_code(), STATUS_GENERATION);
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    #[test]
    fn bin_filter_selects_named_bins() {
        let (codec, _) = setup();
        let key = user_key(4);
        codec.put_record(&bins(json!({"a": 1, "b": 2, "c": 3})), &key, WriteMeta::default(), None).unwrap();

        let out = codec.get_record(&key, &GetOptions::select(["c", "a", "missing"])).unwrap();
        let expected = DynamicValue::map([("c", 3.into()), ("a", 1.into())]);
        assert_eq!(out.get("bins"), Some(&expected));
    }

    #[test]
    fn non_string_filter_fails_before_the_store() {
        let store = Arc::new(CountingStore::default());
        let codec = RecordCodec::new(Arc::new(Transcoder::default()), store.clone());
        let options = GetOptions {
            bins: Some(DynamicValue::List(vec!["a".into(), 1.into()])),
            ..Default::default()
        };
        let err = codec.get_record(&user_key(1), &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
        assert_eq!(store.gets.load(Ordering::SeqCst), 0);

        let not_a_list = GetOptions {
            bins: Some("a".into()),
            ..Default::default()
        };
        assert!(codec.get_record(&user_key(1), &not_a_list).is_err());
        assert_eq!(store.gets.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn metadata_can_be_suppressed() {
        let (codec, _) = setup();
        let key = user_key(5);
        codec.put_record(&bins(json!({"a": 1})), &key, WriteMeta::default(), None).unwrap();
        let options = GetOptions {
            with_metadata: false,
            ..Default::default()
        };
        let out = codec.get_record(&key, &options).unwrap();
        assert_eq!(out.get("metadata"), Some(&DynamicValue::Null));
    }

    #[test]
    fn key_rendering_follows_policy() {
        let (codec, _) = setup();
        let key = user_key(6);
        codec.put_record(&bins(json!({"a": 1})), &key, WriteMeta::default(), None).unwrap();

        let digest_only = codec.get_record(&key, &GetOptions::default()).unwrap();
        let rendered = digest_only.get("key").unwrap();
        assert_eq!(rendered.get("key"), Some(&DynamicValue::Null));
        assert_eq!(rendered.get("digest"), Some(&DynamicValue::String(key.digest().to_hex())));

        let options = GetOptions {
            key_policy: Some(KeyPolicy::Send),
            ..Default::default()
        };
        let sent = codec.get_record(&key, &options).unwrap();
        assert_eq!(sent.get("key").unwrap().get("key"), Some(&DynamicValue::Int(6)));
    }

    #[test]
    fn configured_key_policy_is_the_default() {
        let store = Arc::new(InMemoryRecordStore::new());
        let config = CodecConfig {
            key_policy: KeyPolicy::Send,
            ..Default::default()
        };
        let transcoder = Transcoder::new(Arc::new(SerializerRegistry::new()), config);
        let codec = RecordCodec::new(Arc::new(transcoder), store);
        let key = user_key(7);
        codec.put_record(&bins(json!({"a": 1})), &key, WriteMeta::default(), None).unwrap();
        let out = codec.get_record(&key, &GetOptions::default()).unwrap();
        assert_eq!(out.get("key").unwrap().get("key"), Some(&DynamicValue::Int(7)));
    }

    #[test]
    fn missing_record_is_server_error() {
        let (codec, _) = setup();
        let err = codec.get_record(&user_key(99), &GetOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(err.status_code(), STATUS_NOT_FOUND);
    }

    #[test]
    fn undecodable_bin_names_the_bin() {
        let (codec, _) = setup();
        let record = Record::new(
            user_key(8),
            RecordMeta::default(),
            vec![Bin::new(
                "blob",
                StoreValue::Bytes {
                    kind: kvt_types::BytesType::Other(9),
                    data: vec![1],
                },
            )],
        );
        let err = codec.render_record(record, &GetOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Client);
        assert!(err.message().starts_with("bin 'blob'"));
    }
}
