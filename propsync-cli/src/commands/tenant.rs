use clap::{Args, Subcommand};

use propsync_core::Tenant;

use super::{confirm, parse_date, OutputFormat, Workspace};
use crate::config::Config;

#[derive(Args)]
pub struct TenantCommand {
    #[command(subcommand)]
    pub command: TenantSubcommand,
}

#[derive(Subcommand)]
pub enum TenantSubcommand {
    /// Add a tenant to a property
    Add {
        /// Property ID
        #[arg(long)]
        property: String,

        #[arg(long)]
        name: String,

        /// Lease start (YYYY-MM-DD)
        #[arg(long)]
        lease_start: String,

        /// Lease end (YYYY-MM-DD)
        #[arg(long)]
        lease_end: String,

        /// Monthly rent owed by this tenant
        #[arg(long)]
        rent: f64,

        #[arg(long, default_value = "")]
        email: String,

        #[arg(long, default_value = "")]
        phone: String,

        #[arg(long, default_value = "")]
        payment_method: String,
    },

    /// List tenants
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Update a tenant
    Update {
        /// Tenant ID
        id: String,

        /// Move the tenant to another property
        #[arg(long)]
        property: Option<String>,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        lease_start: Option<String>,

        #[arg(long)]
        lease_end: Option<String>,

        #[arg(long)]
        rent: Option<f64>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        payment_method: Option<String>,
    },

    /// Delete a tenant
    Delete {
        /// Tenant ID
        id: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl TenantCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let workspace = Workspace::open(config)?;
        let store = &workspace.store;

        match &self.command {
            TenantSubcommand::Add {
                property,
                name,
                lease_start,
                lease_end,
                rent,
                email,
                phone,
                payment_method,
            } => {
                let lease_start = parse_date(lease_start)?;
                let lease_end = parse_date(lease_end)?;
                if lease_end < lease_start {
                    return Err("Lease end must not be before lease start.".into());
                }

                let tenant = Tenant::new(property, name, lease_start, lease_end, *rent)
                    .with_contact(email, phone)
                    .with_payment_method(payment_method);

                let created = store.add_tenant(tenant)?;
                workspace.save()?;
                println!("Created tenant:");
                println!("{}", created);
                Ok(())
            }

            TenantSubcommand::List { format } => {
                let tenants = store.list_tenants();
                if tenants.is_empty() {
                    println!("No tenants found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&tenants)?);
                    }
                    OutputFormat::Text => {
                        for tenant in &tenants {
                            let renewal = tenant
                                .lease_renewal()
                                .map(|d| d.to_string())
                                .unwrap_or_else(|| "-".to_string());
                            println!(
                                "  {:36}  {:20} lease {} to {} (renew by {})",
                                tenant.id, tenant.name, tenant.lease_start, tenant.lease_end, renewal
                            );
                        }
                        println!("\nTotal: {} tenant(s)", tenants.len());
                    }
                }
                Ok(())
            }

            TenantSubcommand::Update {
                id,
                property,
                name,
                lease_start,
                lease_end,
                rent,
                email,
                phone,
                payment_method,
            } => {
                let has_updates = property.is_some()
                    || name.is_some()
                    || lease_start.is_some()
                    || lease_end.is_some()
                    || rent.is_some()
                    || email.is_some()
                    || phone.is_some()
                    || payment_method.is_some();
                if !has_updates {
                    return Err("Nothing to update. Provide at least one option.".into());
                }

                let mut tenant = store
                    .get_tenant(id)
                    .ok_or_else(|| format!("Tenant not found: {}", id))?;

                if let Some(p) = property {
                    tenant.property_id = p.clone();
                }
                if let Some(n) = name {
                    tenant.name = n.clone();
                }
                if let Some(d) = lease_start {
                    tenant.lease_start = parse_date(d)?;
                }
                if let Some(d) = lease_end {
                    tenant.lease_end = parse_date(d)?;
                }
                if let Some(r) = rent {
                    tenant.rent_amount = *r;
                }
                if let Some(e) = email {
                    tenant.email = e.clone();
                }
                if let Some(p) = phone {
                    tenant.phone = p.clone();
                }
                if let Some(m) = payment_method {
                    tenant.payment_method = m.clone();
                }

                let updated = store.update_tenant(tenant)?;
                workspace.save()?;
                println!("Updated tenant:");
                println!("{}", updated);
                Ok(())
            }

            TenantSubcommand::Delete { id, force } => {
                let tenant = store
                    .get_tenant(id)
                    .ok_or_else(|| format!("Tenant not found: {}", id))?;

                if !force && !confirm(&format!("Delete tenant '{}'?", tenant.name))? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                store.delete_tenant(id)?;
                workspace.save()?;
                println!("Deleted tenant: {}", tenant.name);
                Ok(())
            }
        }
    }
}
