//! PDDL rendering of the delivery problem.
//!
//! Tiles are named `t_<x>_<y>` and bases `base_<x>_<y>`; every symbol goes
//! through [`sanitize`] so solver output maps back onto coordinates.
use courier_core::{AgentId, GridIndex, Obstacles, ParcelStore, Position};

const DOMAIN: &str = r#"(define (domain deliveroo)
  (:requirements :strips :typing)
  (:types
    agent
    parcel
    tile
    base
  )

  (:predicates
    (at ?a - agent ?t - tile)
    (parcel-at ?p - parcel ?t - tile)
    (carrying ?a - agent ?p - parcel)
    (base-at ?b - base ?t - tile)
    (delivered ?p - parcel)
    (adjacent ?t1 - tile ?t2 - tile)
  )

  (:action move
    :parameters (?a - agent ?from - tile ?to - tile)
    :precondition (and
      (at ?a ?from)
      (adjacent ?from ?to)
    )
    :effect (and
      (not (at ?a ?from))
      (at ?a ?to)
    )
  )

  (:action pickup
    :parameters (?a - agent ?p - parcel ?t - tile)
    :precondition (and
      (at ?a ?t)
      (parcel-at ?p ?t)
    )
    :effect (and
      (not (parcel-at ?p ?t))
      (carrying ?a ?p)
    )
  )

  (:action deposit
    :parameters (?a - agent ?p - parcel ?b - base ?t - tile)
    :precondition (and
      (at ?a ?t)
      (base-at ?b ?t)
      (carrying ?a ?p)
    )
    :effect (and
      (not (carrying ?a ?p))
      (delivered ?p)
    )
  )
)"#;

/// Lowercases `raw`, maps every non-alphanumeric character to `_`, collapses
/// runs of `_` and trims them from both ends.
pub fn sanitize(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len());
    for c in raw.trim().chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_alphanumeric() { c } else { '_' };
        if c == '_' && name.ends_with('_') {
            continue;
        }
        name.push(c);
    }
    name.trim_matches('_').to_owned()
}

pub fn tile_name(position: Position) -> String {
    sanitize(&format!("t_{}_{}", position.x, position.y))
}

pub fn base_name(position: Position) -> String {
    sanitize(&format!("base_{}_{}", position.x, position.y))
}

pub fn agent_name(agent: &AgentId) -> String {
    sanitize(&format!("agent_{agent}"))
}

/// Decodes a `t_<x>_<y>` or `base_<x>_<y>` symbol, in any letter case.
pub fn parse_position(name: &str) -> Option<Position> {
    let lower = name.to_ascii_lowercase();
    let coordinates = lower
        .strip_prefix("t_")
        .or_else(|| lower.strip_prefix("base_"))?;
    let (x, y) = coordinates.split_once('_')?;
    Some(Position::new(x.parse().ok()?, y.parse().ok()?))
}

/// The static STRIPS domain: move, pickup and deposit.
pub fn domain() -> &'static str {
    DOMAIN
}

/// Problem for one agent standing on `at`: deliver every uncarried parcel.
///
/// Tiles in `obstacles` are left out of the adjacency relation.
pub fn problem(
    grid: &GridIndex,
    parcels: &ParcelStore,
    agent: &AgentId,
    at: Position,
    obstacles: &Obstacles,
) -> String {
    let open = |position: Position| grid.is_passable(position) && !obstacles.contains(position);

    let mut tiles = Vec::new();
    if let Some(size) = grid.size() {
        for x in 0..size.width as i32 {
            for y in 0..size.height as i32 {
                let position = Position::new(x, y);
                if grid.is_passable(position) {
                    tiles.push(position);
                }
            }
        }
    }

    let adjacency: Vec<String> = tiles
        .iter()
        .filter(|tile| open(**tile))
        .flat_map(|tile| {
            tile.neighbours()
                .into_iter()
                .filter(|neighbour| open(*neighbour))
                .map(|neighbour| {
                    format!("(adjacent {} {})", tile_name(*tile), tile_name(neighbour))
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let bases: Vec<Position> = grid.bases().collect();
    let loose: Vec<(String, Position)> = parcels
        .iter()
        .filter(|parcel| !parcel.is_carried())
        .map(|parcel| (sanitize(parcel.id.as_str()), parcel.position))
        .collect();

    let agent = agent_name(agent);
    let mut init = vec![format!("(at {agent} {})", tile_name(at))];
    init.extend(
        loose
            .iter()
            .map(|(name, position)| format!("(parcel-at {name} {})", tile_name(*position))),
    );
    init.extend(
        bases
            .iter()
            .map(|base| format!("(base-at {} {})", base_name(*base), tile_name(*base))),
    );
    init.extend(adjacency);

    let join = |names: Vec<String>| names.join(" ");
    let mut lines = vec![
        "(define (problem deliveroo_problem)".to_owned(),
        "  (:domain deliveroo)".to_owned(),
        "  (:objects".to_owned(),
        format!("    {agent} - agent"),
        format!(
            "    {} - parcel",
            join(loose.iter().map(|(name, _)| name.clone()).collect())
        ),
        format!(
            "    {} - base",
            join(bases.iter().map(|base| base_name(*base)).collect())
        ),
        format!(
            "    {} - tile",
            join(tiles.iter().map(|tile| tile_name(*tile)).collect())
        ),
        "  )".to_owned(),
        "  (:init".to_owned(),
    ];
    lines.extend(init.iter().map(|fact| format!("    {fact}")));
    lines.push("  )".to_owned());
    lines.push("  (:goal (and".to_owned());
    lines.extend(loose.iter().map(|(name, _)| format!("    (delivered {name})")));
    lines.push("  ))".to_owned());
    lines.push(")".to_owned());
    lines.join("\n")
}
