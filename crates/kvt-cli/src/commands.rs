use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use kvt_codec::{CodecConfig, SerializerRegistry, Transcoder};
use kvt_config::{ClientConfig, ConfigTransform};
use kvt_record::{
    build_key, GetOptions, InMemoryRecordStore, KeyIdentity, RecordCodec, RecordStore, WriteMeta,
};
use kvt_types::{DynamicValue, KeyPolicy, SerializerPolicy, StoreFeatures, StoreValue};
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let transcoder = Arc::new(load_transcoder(&cli)?);
    let features = StoreFeatures {
        supports_double: !cli.no_double,
        supports_geo: !cli.no_geo,
    };
    let policy = cli.serializer.map(|s| match s {
        SerializerArg::None => SerializerPolicy::None,
        SerializerArg::Builtin => SerializerPolicy::Builtin,
        SerializerArg::User => SerializerPolicy::User,
    });

    match cli.command {
        Command::Encode(args) => cmd_encode(transcoder, features, policy, args),
        Command::Digest(args) => cmd_digest(args),
        Command::Config(args) => cmd_config(args),
        Command::Roundtrip(args) => cmd_roundtrip(transcoder, features, policy, args),
    }
}

/// The CLI registers a JSON-text user serializer so `--serializer user` works.
fn load_transcoder(cli: &Cli) -> anyhow::Result<Transcoder> {
    let config = match &cli.codec_config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            CodecConfig::from_toml_str(&text)?
        }
        None => CodecConfig::default(),
    };
    debug!(config = %config.to_toml_string()?, "codec config loaded");

    let registry = SerializerRegistry::new().with_user_pair(
        |value: &DynamicValue| -> Result<Vec<u8>, String> {
            serde_json::to_vec(&value.to_json()).map_err(|e| e.to_string())
        },
        |bytes: &[u8]| -> Result<DynamicValue, String> {
            serde_json::from_slice(bytes)
                .map(DynamicValue::from_json)
                .map_err(|e| e.to_string())
        },
    );
    Ok(Transcoder::new(Arc::new(registry), config))
}

fn parse_json(text: &str) -> anyhow::Result<DynamicValue> {
    let json: serde_json::Value = serde_json::from_str(text).context("input is not valid JSON")?;
    Ok(DynamicValue::from_json(json))
}

fn parse_identity(key: &str, force_string: bool) -> KeyIdentity {
    match key.parse::<i64>() {
        Ok(n) if !force_string => KeyIdentity::Integer(n),
        _ => KeyIdentity::String(key.to_string()),
    }
}

fn cmd_encode(
    transcoder: Arc<Transcoder>,
    features: StoreFeatures,
    policy: Option<SerializerPolicy>,
    args: EncodeArgs,
) -> anyhow::Result<()> {
    let input = parse_json(&args.json)?;
    let policy = transcoder.policy_or_default(policy);

    if args.value || input.as_map().is_none() {
        let encoded = transcoder.encode(&input, features, policy)?;
        print_store_value(&encoded, 0);
        return Ok(());
    }

    let codec = RecordCodec::new(
        transcoder,
        Arc::new(InMemoryRecordStore::new().with_features(features)),
    );
    let bins = codec.encode_bins(&input, features, policy)?;
    println!("{} {} bin(s)", "✓".green().bold(), bins.len());
    for bin in &bins {
        print!("  {} ", format!("{}:", bin.name).bold());
        print_store_value(&bin.value, 2);
    }
    Ok(())
}

fn cmd_digest(args: DigestArgs) -> anyhow::Result<()> {
    let identity = parse_identity(&args.key, args.string);
    let key = build_key(&args.namespace, &args.set, identity)?;
    println!("{}", key.digest().to_hex());
    debug!(key = %key, "digest computed");
    Ok(())
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    let tree = parse_json(&args.json)?;
    let transform = if args.inspect {
        ConfigTransform::inspect()
    } else {
        ConfigTransform::construct()
    };
    let config = transform.build(&tree)?;
    print_config(&config);
    if args.inspect {
        println!(
            "\n{}",
            serde_json::to_string_pretty(&config.to_dynamic().to_json())?
        );
    }
    Ok(())
}

fn cmd_roundtrip(
    transcoder: Arc<Transcoder>,
    features: StoreFeatures,
    policy: Option<SerializerPolicy>,
    args: RoundtripArgs,
) -> anyhow::Result<()> {
    let store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::new().with_features(features));
    let codec = RecordCodec::new(transcoder, store);

    let key = build_key(&args.namespace, &args.set, parse_identity(&args.key, false))?;
    let bins = parse_json(&args.bins)?;
    codec.put_record(&bins, &key, WriteMeta::with_ttl(args.ttl), policy)?;

    let options = GetOptions {
        key_policy: args.send_key.then_some(KeyPolicy::Send),
        ..Default::default()
    };
    let record = codec.get_record(&key, &options)?;
    println!("{}", serde_json::to_string_pretty(&record.to_json())?);
    Ok(())
}

fn print_config(config: &ClientConfig) {
    println!("{} Configuration valid", "✓".green().bold());
    println!("  Hosts ({}):", config.hosts.len());
    for host in &config.hosts {
        println!("    {}", host.lookup_key().cyan());
    }
    let lookup = config.host_lookup();
    println!("  Unique seeds ({}):", lookup.len());
    for key in lookup.keys() {
        println!("    {}", key.yellow());
    }
    if let Some(user) = &config.user {
        println!("  User: {}", user.bold());
    }
    println!("  Max conns per node: {}", config.max_conns_per_node);
    println!("  Thread pool size: {}", config.thread_pool_size);
    if config.use_shm {
        println!(
            "  Shm: key {:#x}, {} nodes, {} namespaces, takeover {}s",
            config.shm.key,
            config.shm.max_nodes,
            config.shm.max_namespaces,
            config.shm.takeover_threshold_sec
        );
    }
}

fn print_store_value(value: &StoreValue, indent: usize) {
    let pad = " ".repeat(indent);
    match value {
        StoreValue::List(items) => {
            println!("{}", format!("list[{}]", items.len()).dimmed());
            for item in items {
                print!("{pad}  - ");
                print_store_value(item, indent + 4);
            }
        }
        StoreValue::Map(entries) => {
            println!("{}", format!("map[{}]", entries.len()).dimmed());
            for (k, v) in entries {
                print!("{pad}  {} => ", scalar_text(k));
                print_store_value(v, indent + 4);
            }
        }
        other => println!("{}", scalar_text(other)),
    }
}

fn scalar_text(value: &StoreValue) -> String {
    match value {
        StoreValue::Nil => "nil".dimmed().to_string(),
        StoreValue::Boolean(b) => b.to_string().magenta().to_string(),
        StoreValue::Integer(n) => n.to_string().cyan().to_string(),
        StoreValue::Double(f) => format!("{f:?}").cyan().to_string(),
        StoreValue::String(s) => format!("{s:?}").green().to_string(),
        StoreValue::Bytes { kind, data } => {
            format!("bytes<{kind}>[{}]", data.len()).yellow().to_string()
        }
        StoreValue::GeoJson(text) => format!("geojson {text}").blue().to_string(),
        StoreValue::List(_) | StoreValue::Map(_) => value.type_name().to_string(),
    }
}
