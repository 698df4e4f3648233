use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kvt",
    about = "kvt: inspect how dynamic values, keys and configs are transcoded",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Serializer for values the store cannot hold natively
    #[arg(long, global = true)]
    pub serializer: Option<SerializerArg>,

    /// Simulate a store without a native double type
    #[arg(long, global = true)]
    pub no_double: bool,

    /// Simulate a store without GeoJSON support
    #[arg(long, global = true)]
    pub no_geo: bool,

    /// TOML file with codec settings
    #[arg(long, global = true)]
    pub codec_config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum SerializerArg {
    None,
    Builtin,
    User,
}

#[derive(Subcommand)]
pub enum Command {
    /// Encode a JSON document into store values
    Encode(EncodeArgs),
    /// Compute the digest of a key
    Digest(DigestArgs),
    /// Validate a client configuration tree
    Config(ConfigArgs),
    /// Write bins to an in-memory store and read the record back
    Roundtrip(RoundtripArgs),
}

#[derive(Args)]
pub struct EncodeArgs {
    /// JSON document; an object is treated as a bins map
    pub json: String,
    /// Encode as a single value instead of record bins
    #[arg(long)]
    pub value: bool,
}

#[derive(Args)]
pub struct DigestArgs {
    pub namespace: String,
    pub set: String,
    /// Primary key; parsed as an integer when possible
    pub key: String,
    /// Always treat the key as a string
    #[arg(long)]
    pub string: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// JSON configuration tree
    pub json: String,
    /// Render for inspection (credentials are dropped)
    #[arg(long)]
    pub inspect: bool,
}

#[derive(Args)]
pub struct RoundtripArgs {
    pub namespace: String,
    pub set: String,
    pub key: String,
    /// JSON bins map
    pub bins: String,
    /// Echo the primary key in the result
    #[arg(long)]
    pub send_key: bool,
    #[arg(long, default_value = "0")]
    pub ttl: u32,
}
