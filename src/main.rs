use clap::Parser;
use liverpool::analysis::{Usefulness, find_useful_cards};
use liverpool::deck::{CONTRACTS, Deck};
use liverpool::lut::LutStats;
use liverpool::{Card, Hand, Lut, Meld, Objective, Result, Run, Set};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::Serialize;

#[derive(Parser)]
#[command(author, version = env!("BUILD_COMMIT"), about, long_about = None)]
enum Cli {
    #[command(
        about = "Deal random hands and count how often each contract can be laid",
        alias = "sim"
    )]
    Simulate {
        #[arg(long, default_value_t = 2)]
        decks: usize,
        #[arg(long, default_value_t = 1000)]
        iterations: usize,
        /// Seed for the shuffles; random when omitted
        #[arg(long)]
        seed: Option<u64>,
        /// Only simulate this round (1 to 7)
        #[arg(long)]
        round: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    #[command(about = "List the sets, runs and melds of one hand", alias = "an")]
    Analyze {
        #[arg(long, default_value = "1,1")]
        objective: Objective,
        /// Phantom wilds to try past the first level that lays down
        #[arg(long, default_value_t = 0)]
        extra_wilds: u32,
        #[arg(long)]
        json: bool,
        /// Cards such as 7H 10S QD, with * for a wild
        #[arg(required = true)]
        cards: Vec<Card>,
    },
}

#[derive(Serialize)]
struct RoundReport {
    round: usize,
    objective: Objective,
    cards: usize,
    hands: usize,
    with_set: usize,
    with_run: usize,
    with_meld: usize,
    going_out: usize,
}

#[derive(Serialize)]
struct SimulationReport {
    seed: u64,
    decks: usize,
    rounds: Vec<RoundReport>,
    lut: LutStats,
}

#[derive(Serialize)]
struct HandReport {
    cards: Vec<Card>,
    objective: Objective,
    sets: Vec<Set>,
    runs: Vec<Run>,
    melds: Vec<Meld>,
    useful: Usefulness,
}

fn simulate(
    decks: usize,
    iterations: usize,
    seed: u64,
    round: Option<usize>,
) -> Result<SimulationReport> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut lut = Lut::new();
    let mut rounds = Vec::new();
    for (i, &(objective, cards)) in CONTRACTS.iter().enumerate() {
        if round.is_some_and(|r| r != i + 1) {
            continue;
        }
        let mut report = RoundReport {
            round: i + 1,
            objective,
            cards,
            hands: iterations,
            with_set: 0,
            with_run: 0,
            with_meld: 0,
            going_out: 0,
        };
        for _ in 0..iterations {
            let hand = Deck::shuffled(decks, &mut rng).deal(cards)?;
            if lut.iter_sets(&hand).next().is_some() {
                report.with_set += 1;
            }
            if lut.iter_runs(&hand).next().is_some() {
                report.with_run += 1;
            }
            let mut melds = lut.iter_melds(&hand, objective).peekable();
            if melds.peek().is_some() {
                report.with_meld += 1;
            }
            if melds.any(|meld| meld.len() == hand.len()) {
                report.going_out += 1;
            }
        }
        log::info!(
            "round {} ({objective}): {} of {iterations} hands can lay down",
            report.round,
            report.with_meld
        );
        rounds.push(report);
    }
    Ok(SimulationReport {
        seed,
        decks,
        rounds,
        lut: lut.stats(),
    })
}

fn analyze(hand: &Hand, objective: Objective, extra_wilds: u32) -> HandReport {
    let mut lut = Lut::new();
    HandReport {
        cards: hand.cards().collect(),
        objective,
        sets: lut.iter_sets(hand).collect(),
        runs: lut.iter_runs(hand).collect(),
        melds: lut.iter_melds(hand, objective).collect(),
        useful: find_useful_cards(hand, objective, &mut lut, extra_wilds),
    }
}

fn percent(n: usize, of: usize) -> f64 {
    if of == 0 {
        0.0
    } else {
        100.0 * n as f64 / of as f64
    }
}

fn print_simulation(report: &SimulationReport) {
    println!("Liverpool simulation, {} decks, seed {}", report.decks, report.seed);
    for r in &report.rounds {
        println!(
            "round {} ({}, {} cards): set {:.1}%  run {:.1}%  meld {:.1}%  out {:.1}%",
            r.round,
            r.objective,
            r.cards,
            percent(r.with_set, r.hands),
            percent(r.with_run, r.hands),
            percent(r.with_meld, r.hands),
            percent(r.going_out, r.hands),
        );
    }
    println!(
        "lut: {} hits, {} misses, {} entries",
        report.lut.hits, report.lut.misses, report.lut.entries
    );
}

fn print_hand(report: &HandReport) {
    let cards: Vec<String> = report.cards.iter().map(|c| c.to_string()).collect();
    println!("hand: {}  objective: {}", cards.join(" "), report.objective);
    println!("----sets----");
    for set in &report.sets {
        println!("    {set}");
    }
    println!("----runs----");
    for run in &report.runs {
        println!("    {run}");
    }
    println!("----melds----");
    for meld in &report.melds {
        println!("    {meld}");
    }
    println!("----useful----");
    match report.useful.distance {
        Some(n) => println!("    lays down with {n} more wild(s)"),
        None => println!("    cannot lay down"),
    }
    for (card, levels) in &report.useful.missing {
        let levels: Vec<String> = levels.iter().map(|(k, n)| format!("+{k}: {n}")).collect();
        println!("    missing {card}: {}", levels.join(", "));
    }
    for (card, n) in &report.useful.existing {
        println!("    holding {card}: {n}");
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse() {
        Cli::Simulate {
            decks,
            iterations,
            seed,
            round,
            json,
        } => {
            let seed = seed.unwrap_or_else(rand::random);
            log::info!("simulating {iterations} deals per round with seed {seed}");
            let report = simulate(decks, iterations, seed, round)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_simulation(&report);
            }
        }
        Cli::Analyze {
            objective,
            extra_wilds,
            json,
            cards,
        } => {
            let hand: Hand = cards.into_iter().collect();
            let report = analyze(&hand, objective, extra_wilds);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_hand(&report);
            }
        }
    }
    Ok(())
}
