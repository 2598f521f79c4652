use agentry_core::ActorInfo;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};

pub fn print_actor_table(actors: &[ActorInfo]) {
    println!("{}", "Registered Actors".cyan().bold());
    println!();

    if actors.is_empty() {
        println!("  {}", "No actors registered.".dimmed());
        return;
    }

    println!("{}", actor_table(actors));
    println!();
    println!("  {} {}", "Total:".dimmed(), actors.len());
}

fn actor_table(actors: &[ActorInfo]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Name").fg(Color::White),
            Cell::new("Actor ID").fg(Color::White),
            Cell::new("Kind").fg(Color::White),
            Cell::new("Concurrency").fg(Color::White),
            Cell::new("Spawned").fg(Color::White),
        ]);

    for actor in actors {
        table.add_row(vec![
            Cell::new(&actor.name).fg(Color::Cyan),
            Cell::new(truncate_uuid(&actor.id.to_string())),
            Cell::new(&actor.kind),
            Cell::new(actor.max_concurrency),
            Cell::new(actor.spawned_at.format("%H:%M:%S%.3f").to_string()),
        ]);
    }

    table
}

fn truncate_uuid(id: &str) -> String {
    id.chars().take(8).collect()
}
