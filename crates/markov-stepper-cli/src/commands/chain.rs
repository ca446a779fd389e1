//! Chain editing commands.
//!
//! Every editing command loads the document, applies one change and writes the
//! document back. A failed change leaves the file untouched.

use anyhow::{Context, Result};

use markov_stepper_engine::{ChainDocument, ChainResult, DocumentStore, Position, Simulation};

use crate::config::Config;

/// Load the chain document into a fresh simulation.
pub fn open(config: &Config, store: &DocumentStore) -> Result<Simulation> {
    if !store.exists() {
        anyhow::bail!(
            "No chain document at {}. Run `markov generate` first.",
            store.path().display()
        );
    }
    let mut sim = Simulation::new(config.simulation());
    store
        .load_into(&mut sim)
        .with_context(|| format!("Failed to load {}", store.path().display()))?;
    Ok(sim)
}

/// Load, apply `f`, and save only if `f` succeeded.
fn edit<T>(
    config: &Config,
    store: &DocumentStore,
    f: impl FnOnce(&mut Simulation) -> ChainResult<T>,
) -> Result<T> {
    let mut sim = open(config, store)?;
    let output = f(&mut sim)?;
    store
        .save(&sim)
        .with_context(|| format!("Failed to save {}", store.path().display()))?;
    Ok(output)
}

/// Replace the document with a freshly generated chain.
pub fn generate(config: &Config, store: &DocumentStore, count: usize) -> Result<()> {
    let sim = Simulation::generated(config.simulation(), count)?;
    let path = store.save(&sim)?;
    println!("✅ Generated {} states -> {}", count, path.display());
    Ok(())
}

/// Print the chain: states, matrix, validity and statistics.
pub fn show(config: &Config, store: &DocumentStore, json: bool) -> Result<()> {
    let sim = open(config, store)?;

    if json {
        println!("{}", ChainDocument::capture(&sim).to_json()?);
        return Ok(());
    }

    let chain = sim.store();
    let stats = sim.stats();

    println!("📄 {}", store.path().display());
    println!(
        "States: {}   Current: {}   Total steps: {}",
        chain.state_count(),
        sim.current_state(),
        stats.total_steps()
    );
    println!();

    println!("{:>4} {:>4} {:>18}  {}", "#", "id", "position", "color");
    for (index, node) in chain.nodes().iter().enumerate() {
        let marker = if index == sim.current_state() { "*" } else { " " };
        println!(
            "{}{:>3} {:>4} {:>18}  {}",
            marker,
            index,
            node.id,
            format!("({:.1}, {:.1})", node.position.x, node.position.y),
            node.color
        );
    }
    println!();

    print!("{:>4}", "");
    for j in 0..chain.state_count() {
        print!(" {:>7}", j);
    }
    println!(" {:>7}", "sum");
    for (i, row) in chain.matrix().rows().iter().enumerate() {
        print!("{:>4}", i);
        for p in row {
            print!(" {:>7.3}", p);
        }
        println!(" {:>7.3}", chain.matrix().row_sum(i));
    }

    let report = sim.matrix_report();
    if let Some(warning) = report.warning() {
        let rows: Vec<String> = report.invalid_rows.iter().map(|r| r.to_string()).collect();
        println!("\n⚠️  {} (rows: {})", warning, rows.join(", "));
    }
    println!();

    println!("{:>4} {:>8} {:>8}", "#", "visits", "share");
    for row in stats.rows() {
        println!(
            "{:>4} {:>8} {:>7.1}%",
            row.index,
            row.visits,
            row.percentage * 100.0
        );
    }

    Ok(())
}

pub fn add_state(
    config: &Config,
    store: &DocumentStore,
    position: Position,
    color: Option<String>,
) -> Result<()> {
    let (id, index) = edit(config, store, |sim| {
        let id = sim.add_state(position, color)?;
        Ok((id, sim.store().state_count() - 1))
    })?;
    println!("Added state {} (id {})", index, id);
    Ok(())
}

pub fn remove_state(config: &Config, store: &DocumentStore, index: usize) -> Result<()> {
    let removed = edit(config, store, |sim| sim.remove_state(index))?;
    println!("Removed state {} ({})", index, removed.color);
    Ok(())
}

pub fn move_state(
    config: &Config,
    store: &DocumentStore,
    index: usize,
    position: Position,
) -> Result<()> {
    let placed = edit(config, store, |sim| sim.move_state(index, position))?;
    println!("Moved state {} to ({:.1}, {:.1})", index, placed.x, placed.y);
    Ok(())
}

pub fn set_transition(
    config: &Config,
    store: &DocumentStore,
    from: usize,
    to: usize,
    probability: f64,
) -> Result<()> {
    let (previous, row_sum) = edit(config, store, |sim| {
        let previous = sim.set_transition(from, to, probability)?;
        Ok((previous, sim.store().matrix().row_sum(from)))
    })?;
    println!(
        "P({} -> {}) = {} (was {}), row {} sums to {:.3}",
        from, to, probability, previous, from, row_sum
    );
    Ok(())
}

pub fn clear_transition(
    config: &Config,
    store: &DocumentStore,
    from: usize,
    to: usize,
) -> Result<()> {
    let previous = edit(config, store, |sim| sim.clear_transition(from, to))?;
    println!("P({} -> {}) = 0 (was {})", from, to, previous);
    Ok(())
}

/// Create or remove a single edge.
pub fn edge(
    config: &Config,
    store: &DocumentStore,
    from: usize,
    to: usize,
    remove: bool,
) -> Result<()> {
    let changed = edit(config, store, |sim| {
        if remove {
            sim.remove_edge(from, to)
        } else {
            sim.add_edge(from, to)
        }
    })?;

    match (remove, changed) {
        (false, true) => println!("Added edge {} -> {}", from, to),
        (false, false) => println!("Edge {} -> {} already exists", from, to),
        (true, true) => println!("Removed edge {} -> {}", from, to),
        (true, false) => println!("No edge {} -> {}", from, to),
    }
    Ok(())
}

/// Normalise one row, or every row.
pub fn normalize(config: &Config, store: &DocumentStore, row: Option<usize>) -> Result<()> {
    match row {
        Some(index) => {
            let changed = edit(config, store, |sim| sim.normalize_row(index))?;
            if changed {
                println!("Normalized row {}", index);
            } else {
                println!("Row {} has no outgoing probability; left unchanged", index);
            }
        }
        None => {
            let rows = edit(config, store, |sim| Ok(sim.normalize_all()))?;
            println!("Normalized {} rows", rows);
        }
    }
    Ok(())
}

/// Redraw the matrix for the existing states.
pub fn randomize(config: &Config, store: &DocumentStore) -> Result<()> {
    edit(config, store, |sim| {
        sim.randomize_matrix();
        Ok(())
    })?;
    println!("Randomized transition matrix");
    Ok(())
}
