//! Line-oriented terminal UI: command parsing and snapshot rendering

use oakvale_core::character::LifeStatus;
use oakvale_core::engine::{PlayerAction, WorldSnapshot};
use oakvale_core::world::Direction;

pub const HELP: &str = "\
Commands:
  n, s, e, w, ne, nw, se, sw   move one tile (or: move <direction>)
  attack <name>                melee an adjacent character
  talk <name> <message>        speak to an adjacent character
  sell <item> to <name> [for <gold>]
  use <item>                   use or consume an inventory item
  take <item> / drop <item>    pick up from an adjacent tile / drop here
  wait                         let a turn pass
  look                         redraw the map
  help                         this text
  quit                         leave Oakvale";

/// One line of player input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Act(PlayerAction),
    Look,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb.to_lowercase(), rest.trim()),
        None => (line.to_lowercase(), ""),
    };

    let need = |what: &str| -> Result<String, String> {
        if rest.is_empty() {
            Err(format!("{} what? Try 'help'.", verb_label(&verb, what)))
        } else {
            Ok(rest.to_string())
        }
    };

    let command = match verb.as_str() {
        "" => return Err("Type a command, or 'help'.".to_string()),
        "q" | "quit" | "exit" => Command::Quit,
        "?" | "h" | "help" => Command::Help,
        "l" | "look" => Command::Look,
        "." | "wait" | "rest" => Command::Act(PlayerAction::Wait),
        "move" | "go" | "walk" => Command::Act(PlayerAction::Move {
            direction: Direction::parse(&rest.replace('-', ""))
                .ok_or_else(|| format!("'{}' is not a direction", rest))?,
        }),
        "attack" | "hit" | "fight" => Command::Act(PlayerAction::Attack {
            target: need("whom")?,
        }),
        "talk" | "say" | "tell" => {
            let (target, message) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| "Usage: talk <name> <message>".to_string())?;
            Command::Act(PlayerAction::Talk {
                target: target.to_string(),
                message: message.trim().to_string(),
            })
        }
        "sell" | "trade" => parse_sell(rest)?,
        "use" | "drink" | "eat" => Command::Act(PlayerAction::UseItem { item: need("what")? }),
        "take" | "get" | "pickup" => Command::Act(PlayerAction::PickUp { item: need("what")? }),
        "drop" => Command::Act(PlayerAction::Drop { item: need("what")? }),
        _ => match Direction::parse(&verb) {
            Some(direction) if rest.is_empty() => Command::Act(PlayerAction::Move { direction }),
            _ => return Err(format!("Unknown command '{}'. Try 'help'.", verb)),
        },
    };
    Ok(command)
}

fn verb_label(verb: &str, what: &str) -> String {
    let mut label = verb.to_string();
    if let Some(first) = label.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    format!("{} {}", label, what)
}

/// `sell <item> to <name> [for <price>]`
fn parse_sell(rest: &str) -> Result<Command, String> {
    let usage = || "Usage: sell <item> to <name> [for <gold>]".to_string();
    let (item, tail) = rest.rsplit_once(" to ").ok_or_else(usage)?;
    let (target, price) = match tail.split_once(" for ") {
        Some((target, price)) => {
            let price = price
                .trim()
                .trim_end_matches("gold")
                .trim()
                .parse::<u32>()
                .map_err(|_| format!("'{}' is not a price", price.trim()))?;
            (target, Some(price))
        }
        None => (tail, None),
    };
    if item.trim().is_empty() || target.trim().is_empty() {
        return Err(usage());
    }
    Ok(Command::Act(PlayerAction::Trade {
        target: target.trim().to_string(),
        item: item.trim().to_string(),
        price,
    }))
}

/// Map with characters and ground items drawn over the terrain
pub fn render_map(snapshot: &WorldSnapshot) -> String {
    let mut grid: Vec<Vec<char>> = snapshot.tiles.iter().map(|row| row.chars().collect()).collect();
    let mut put = |x: i32, y: i32, glyph: char| {
        if let (Ok(x), Ok(y)) = (usize::try_from(x), usize::try_from(y)) {
            if let Some(cell) = grid.get_mut(y).and_then(|row| row.get_mut(x)) {
                *cell = glyph;
            }
        }
    };

    for item in &snapshot.ground_items {
        put(item.position.x, item.position.y, '*');
    }
    for sheet in &snapshot.characters {
        let glyph = match (sheet.id.is_player(), sheet.status) {
            (_, LifeStatus::Dead) => continue,
            (true, _) => '@',
            (false, LifeStatus::Defeated) => '%',
            (false, LifeStatus::Alive) => sheet.class.symbol(),
        };
        put(sheet.position.x, sheet.position.y, glyph);
    }

    grid.into_iter()
        .map(|row| row.into_iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Time, player vitals and what happened this turn
pub fn render_status(snapshot: &WorldSnapshot) -> String {
    let mut out = format!("Turn {} - {}\n", snapshot.turn, snapshot.time);
    if let Some(player) = snapshot.characters.iter().find(|c| c.id.is_player()) {
        out.push_str(&format!(
            "{} the {} {}  HP {}/{}  Gold {}  at {}\n",
            player.name,
            player.race,
            player.class,
            player.hp,
            player.max_hp,
            player.gold,
            player.position
        ));
        if !player.inventory.is_empty() {
            out.push_str(&format!("Carrying: {}\n", player.inventory.join(", ")));
        }
    }
    for event in &snapshot.events {
        out.push_str(&format!("  {}\n", event.summary));
    }
    out
}

pub fn render(snapshot: &WorldSnapshot) -> String {
    format!("{}\n\n{}", render_map(snapshot), render_status(snapshot))
}
