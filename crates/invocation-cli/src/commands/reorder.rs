//! Moving records among their siblings

use colored::Colorize;
use invocation_store::Stored;

use crate::context::{Context, parse_id};
use crate::error::Result;

/// Move a checklist, item or task to a zero-based position
pub fn run_move<R: Stored>(ctx: &Context, id: &str, position: usize) -> Result<()> {
    let id = parse_id(R::KIND, id)?;
    let mut store = ctx.open_store()?;
    let written = store.reorder::<R>(&id, position)?;
    ctx.commit(&mut store)?;

    if written == 0 {
        println!("{} already at position {}", R::KIND, position);
    } else {
        println!(
            "{} {} to position {} ({} reindexed)",
            "Moved".green().bold(),
            R::KIND,
            position,
            written
        );
    }
    Ok(())
}
