//! Project initialization (`bookish init`).

use anyhow::{Context, Result};

pub fn cmd_init(project_dir: &std::path::Path) -> Result<()> {
    use bookish::bookish_config::{BookishToml, CONFIG_FILE};

    let bookish_dir = project_dir.join(".bookish");
    let config_path = bookish_dir.join(CONFIG_FILE);
    let was_initialized = config_path.exists();

    std::fs::create_dir_all(bookish_dir.join("artifacts"))
        .context("Failed to create .bookish directory")?;

    if was_initialized {
        println!(
            "Bookish project already initialized at {}",
            bookish_dir.display()
        );
        println!("Directory structure verified.");
        return Ok(());
    }

    BookishToml::default().save(&config_path)?;

    println!("Initialized bookish project at {}", bookish_dir.display());
    println!();
    println!("Created directory structure:");
    println!("  .bookish/");
    println!("  ├── bookish.toml  # Configuration (use `bookish config show`)");
    println!("  └── artifacts/    # Published schedules and engagement packs");
    println!();
    println!("Next steps:");
    println!("  1. Optionally set GITHUB_TOKEN and [publisher] to post artifacts as issues");
    println!("  2. Run `bookish chat` to pick a book");

    Ok(())
}
