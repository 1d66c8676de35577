use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use erm_core::{Mission, MissionInput, MissionStatus};
use erm_storage::MissionStore;

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
pub enum MissionCommand {
    List(ListArgs),
    Show(ShowArgs),
    #[command(alias = "create")]
    Add(AddArgs),
    #[command(alias = "rm")]
    Remove(RemoveArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long)]
    pub status: Option<MissionStatus>,
    #[arg(long)]
    pub user: Option<String>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub id: String,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    pub name: String,
    #[arg(long, alias = "description")]
    pub desc: Option<String>,
    #[arg(long)]
    pub status: Option<MissionStatus>,
    #[arg(long, value_delimiter = ',')]
    pub assign: Vec<String>,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    pub id: String,
}

pub fn run(store: &MissionStore, command: MissionCommand) -> Result<()> {
    match command {
        MissionCommand::List(args) => list(store, args),
        MissionCommand::Show(args) => show(store, args),
        MissionCommand::Add(args) => add(store, args),
        MissionCommand::Remove(args) => remove(store, args),
    }
}

fn list(store: &MissionStore, args: ListArgs) -> Result<()> {
    let mut missions = match args.status {
        Some(status) => store
            .missions_by_status(status)
            .context("Failed to list missions by status")?,
        None => store.missions().context("Failed to list missions")?,
    };
    if let Some(user) = &args.user {
        missions.retain(|mission| mission.assigned_to.iter().any(|member| member == user));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&missions)?);
        return Ok(());
    }

    if missions.is_empty() {
        println!("No missions found");
        return Ok(());
    }

    println!("Found {} mission(s):", missions.len());
    for mission in &missions {
        print_mission_line(mission);
    }
    Ok(())
}

fn show(store: &MissionStore, args: ShowArgs) -> Result<()> {
    let Some(mission) = store
        .mission_by_id(&args.id)
        .context("Failed to load mission")?
    else {
        println!("No mission found with id {}", args.id);
        return Ok(());
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&mission)?);
        return Ok(());
    }

    println!("{} ({})", mission.name, mission.id);
    println!("  status:      {}", mission.status);
    println!("  origin:      {}", mission.origin());
    println!("  assigned to: {}", format_users(&mission.assigned_to));
    println!("  created:     {}", mission.created_at.to_rfc3339());
    println!("  updated:     {}", mission.updated_at.to_rfc3339());
    if !mission.description.is_empty() {
        println!("  description: {}", mission.description);
    }

    let measures = store
        .measures_by_mission(&mission.id)
        .context("Failed to load security measures")?;
    if !measures.is_empty() {
        println!("  security measures ({}):", measures.len());
        for measure in &measures {
            println!("    - {} ({})", measure.name, measure.id);
        }
    }
    Ok(())
}

fn add(store: &MissionStore, args: AddArgs) -> Result<()> {
    let mission = store
        .create_mission(MissionInput {
            name: args.name,
            description: args.desc.unwrap_or_default(),
            status: args.status,
            assigned_to: args.assign,
            ..Default::default()
        })
        .context("Failed to create mission")?;

    println!("Created mission \"{}\" ({})", mission.name, mission.id);
    Ok(())
}

fn remove(store: &MissionStore, args: RemoveArgs) -> Result<()> {
    store
        .delete_mission(&args.id)
        .context("Failed to delete mission")?;
    println!("Removed mission {}", args.id);
    Ok(())
}

fn print_mission_line(mission: &Mission) {
    println!(
        "- [{}] \"{}\" ({}) created {}",
        mission.status,
        mission.name,
        mission.id,
        mission.created_at.to_rfc3339()
    );
}

fn format_users(users: &[String]) -> String {
    if users.is_empty() {
        "nobody".to_string()
    } else {
        users.join(", ")
    }
}
