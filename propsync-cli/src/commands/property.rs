use clap::{Args, Subcommand};

use propsync_core::{Property, PropertyStatus};

use super::{confirm, OutputFormat, Workspace};
use crate::config::Config;

#[derive(Args)]
pub struct PropertyCommand {
    #[command(subcommand)]
    pub command: PropertySubcommand,
}

#[derive(Subcommand)]
pub enum PropertySubcommand {
    /// Add a property
    Add {
        /// Street address
        #[arg(long)]
        address: String,

        /// Monthly rent
        #[arg(long)]
        rent: f64,

        #[arg(long, default_value = "")]
        city: String,

        #[arg(long, default_value = "")]
        state: String,

        #[arg(long, default_value = "")]
        zipcode: String,

        /// Status (vacant, occupied, maintenance)
        #[arg(long, default_value = "vacant")]
        status: String,
    },

    /// List properties
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Update a property
    Update {
        /// Property ID
        id: String,

        #[arg(long)]
        address: Option<String>,

        #[arg(long)]
        rent: Option<f64>,

        #[arg(long)]
        city: Option<String>,

        #[arg(long)]
        state: Option<String>,

        #[arg(long)]
        zipcode: Option<String>,

        /// Status (vacant, occupied, maintenance)
        #[arg(long)]
        status: Option<String>,
    },

    /// Delete a property with its tenants and payments
    Delete {
        /// Property ID
        id: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl PropertyCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let workspace = Workspace::open(config)?;
        let store = &workspace.store;

        match &self.command {
            PropertySubcommand::Add {
                address,
                rent,
                city,
                state,
                zipcode,
                status,
            } => {
                let status: PropertyStatus = status.parse()?;
                let property = Property::new(address, *rent)
                    .with_location(city, state, zipcode)
                    .with_status(status);

                let created = store.add_property(property)?;
                workspace.save()?;
                println!("Created property:");
                println!("{}", created);
                Ok(())
            }

            PropertySubcommand::List { format } => {
                let properties = store.list_properties();
                if properties.is_empty() {
                    println!("No properties found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&properties)?);
                    }
                    OutputFormat::Text => {
                        for property in &properties {
                            println!(
                                "  {:36}  {:11} {:>10.2}  {}",
                                property.id,
                                property.status.as_str(),
                                property.rent,
                                property.address
                            );
                        }
                        println!("\nTotal: {} propert(ies)", properties.len());
                    }
                }
                Ok(())
            }

            PropertySubcommand::Update {
                id,
                address,
                rent,
                city,
                state,
                zipcode,
                status,
            } => {
                let has_updates = address.is_some()
                    || rent.is_some()
                    || city.is_some()
                    || state.is_some()
                    || zipcode.is_some()
                    || status.is_some();
                if !has_updates {
                    return Err("Nothing to update. Provide at least one option.".into());
                }

                let mut property = store
                    .get_property(id)
                    .ok_or_else(|| format!("Property not found: {}", id))?;

                if let Some(a) = address {
                    property.address = a.clone();
                }
                if let Some(r) = rent {
                    property.rent = *r;
                }
                if let Some(c) = city {
                    property.city = c.clone();
                }
                if let Some(s) = state {
                    property.state = s.clone();
                }
                if let Some(z) = zipcode {
                    property.zipcode = z.clone();
                }
                if let Some(s) = status {
                    property.status = s.parse()?;
                }

                let updated = store.update_property(property)?;
                workspace.save()?;
                println!("Updated property:");
                println!("{}", updated);
                Ok(())
            }

            PropertySubcommand::Delete { id, force } => {
                let property = store
                    .get_property(id)
                    .ok_or_else(|| format!("Property not found: {}", id))?;

                if !force {
                    let tenants = store
                        .list_tenants()
                        .iter()
                        .filter(|t| t.property_id == property.id)
                        .count();
                    let payments = store
                        .list_payments()
                        .iter()
                        .filter(|p| p.property_id == property.id)
                        .count();
                    let prompt = format!(
                        "Delete property '{}' with {} tenant(s) and {} payment(s)?",
                        property.address, tenants, payments
                    );
                    if !confirm(&prompt)? {
                        println!("Deletion cancelled.");
                        return Ok(());
                    }
                }

                store.delete_property(id)?;
                workspace.save()?;
                println!("Deleted property: {}", property.address);
                Ok(())
            }
        }
    }
}
