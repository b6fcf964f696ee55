use std::io::stderr;

use anyhow::Result;
use clap::{ArgGroup, Parser};
use ehbc_core::collection_client::{
    self, CollectionType, Endpoints, LookupRequest, CALENDARS_URL, SEARCH_URL,
};
use tracing_subscriber::EnvFilter;

/// Find bin collection dates on East Hertfordshire Council's website.
#[derive(Debug, Parser)]
#[command(group(
    ArgGroup::new("collection_type")
        .required(true)
        .args(["refuse", "recycling", "organic"])
))]
pub struct Arguments {
    /// return the next refuse collection date
    #[arg(long)]
    pub refuse: bool,
    /// return the next recycling collection date
    #[arg(long)]
    pub recycling: bool,
    /// return the next organic collection date
    #[arg(long)]
    pub organic: bool,
    /// the house name or number
    pub house_number: String,
    /// the postcode, case sensitive and including the space
    pub postcode: String,
    /// the landing page handing out the form token
    #[arg(long, env = "EHBC_CALENDARS_URL", default_value = CALENDARS_URL)]
    pub calendars_url: String,
    /// the endpoint the search form is posted to
    #[arg(long, env = "EHBC_SEARCH_URL", default_value = SEARCH_URL)]
    pub search_url: String,
}

impl From<&Arguments> for CollectionType {
    fn from(value: &Arguments) -> Self {
        if value.refuse {
            CollectionType::Refuse
        } else if value.recycling {
            CollectionType::Recycling
        } else {
            CollectionType::Organic
        }
    }
}

impl From<&Arguments> for Endpoints {
    fn from(value: &Arguments) -> Self {
        Endpoints {
            calendars_url: value.calendars_url.clone(),
            search_url: value.search_url.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Arguments::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(stderr)
        .init();
    let request = LookupRequest::new(&args.house_number, &args.postcode)?;
    let date = collection_client::lookup_with(
        &Endpoints::from(&args),
        &request,
        CollectionType::from(&args),
    )
    .await?;
    println!("{date}");
    Ok(())
}
