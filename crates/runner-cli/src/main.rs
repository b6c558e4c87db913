use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use contracts::SessionConfig;
use runner_api::{serve, SessionApi};
use runner_core::catalog;

fn print_usage() {
    println!("runner-cli <command>");
    println!("commands:");
    println!("  catalog");
    println!("    lists the builtin game catalog");
    println!("  show <game_id>");
    println!("    prints the full question set of one game");
    println!("  simulate <game_id> <answers> [seed] [sqlite_path]");
    println!("    answers: comma-separated option ids, '-' waits for the countdown to expire");
    println!("  serve [addr]");
    println!("    default addr: 127.0.0.1:8080");
}

fn parse_socket_addr(value: Option<&String>) -> Result<SocketAddr, String> {
    let raw = value.map(String::as_str).unwrap_or("127.0.0.1:8080");
    raw.parse::<SocketAddr>()
        .map_err(|_| format!("invalid addr: {raw}"))
}

fn default_sqlite_path() -> String {
    std::env::var("GAMERUNS_SQLITE_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "game_runs.sqlite".to_string())
}

fn parse_sqlite_path(value: Option<&String>) -> String {
    value
        .map(String::to_string)
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(default_sqlite_path)
}

fn print_catalog() {
    for game in catalog::builtin_games() {
        println!(
            "{}  {:?}/{:?}  \"{}\"  questions={} badge={} countdown={}",
            game.game_id,
            game.pillar,
            game.audience,
            game.title,
            game.question_count(),
            game.badge
                .map(|rule| format!("{}+", rule.min_correct))
                .unwrap_or_else(|| "none".to_string()),
            game.countdown
                .map(|rule| format!("{}s", rule.seconds_per_question))
                .unwrap_or_else(|| "none".to_string()),
        );
    }
}

fn show_game(game_id: &str) -> Result<(), String> {
    let game = catalog::game_by_id(game_id).ok_or_else(|| format!("unknown game_id: {game_id}"))?;

    println!("{} \"{}\"", game.game_id, game.title);
    for (index, question) in game.questions.iter().enumerate() {
        println!("  Q{}: {}", index + 1, question.prompt);
        for option in &question.options {
            let marker = if option.correct { "*" } else { " " };
            println!("    {marker} [{}] {}", option.id, option.label);
        }
    }
    Ok(())
}

fn run_simulation(args: &[String]) -> Result<(), String> {
    let game_id = args
        .get(2)
        .cloned()
        .ok_or_else(|| "missing game_id".to_string())?;
    let answers = args
        .get(3)
        .cloned()
        .ok_or_else(|| "missing answers".to_string())?;
    let seed = args
        .get(4)
        .map(|value| {
            value
                .parse::<u64>()
                .map_err(|_| format!("invalid seed: {value}"))
        })
        .transpose()?;
    let sqlite_path = parse_sqlite_path(args.get(5));

    let mut config = SessionConfig::for_game(format!("cli_{game_id}"), game_id.clone());
    if let Some(seed) = seed {
        config.seed = seed;
    }

    let mut api = SessionApi::from_game_id(&game_id, config)
        .map_err(|err| format!("{}: {}", game_id, err.message))?;
    api.attach_sqlite_store(PathBuf::from(&sqlite_path))
        .map_err(|err| format!("failed to attach sqlite store: {err}"))?;
    api.initialize_session_storage(true)
        .map_err(|err| format!("failed to initialize session storage: {err}"))?;

    let feedback_ticks = api.session().spec().feedback_delay_ticks();
    let countdown_ticks = api.session().spec().countdown.map(|rule| rule.ticks_per_question());

    api.start();
    for token in answers.split(',').map(str::trim) {
        if api.session().finished() {
            return Err(format!("answer '{token}' arrived after the run finished"));
        }

        if token == "-" {
            let Some(ticks) = countdown_ticks else {
                return Err(format!("'{game_id}' has no countdown; '-' is not allowed"));
            };
            api.step(ticks + 1);
            if !api.session().answered() && !api.session().finished() {
                return Err("countdown did not expire as expected".to_string());
            }
        } else {
            let result = api.select_option(token);
            if !result.accepted {
                let error = result.error.map(|err| err.message).unwrap_or_default();
                return Err(format!("answer '{token}' rejected: {error}"));
            }
        }

        api.step(feedback_ticks + 1);
    }

    if let Some(error) = api.last_persistence_error() {
        return Err(format!("persistence error after simulation: {error}"));
    }

    println!("{}", api.status());
    match api.completion_report() {
        Some(report) => println!(
            "finished score={}/{} correct={} badge={:?} coins={} xp={} next_game={:?}",
            report.score,
            report.max_score,
            report.correct_answers,
            report.badge_earned,
            report.reward.total_coins,
            report.reward.total_xp,
            report.next_game,
        ),
        None => println!(
            "in progress: question {}/{} score={}",
            api.session().question_index() + 1,
            api.session().spec().question_count(),
            api.session().score(),
        ),
    }
    println!("sqlite={sqlite_path}");
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    match command {
        Some("catalog") => {
            print_catalog();
        }
        Some("show") => {
            let game_id = args.get(2).map(String::as_str).unwrap_or_default();
            if let Err(err) = show_game(game_id) {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        }
        Some("simulate") => {
            if let Err(err) = run_simulation(&args) {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        }
        Some("serve") => match parse_socket_addr(args.get(2)) {
            Ok(addr) => {
                println!("serving api on http://{addr}");
                if let Err(err) = serve(addr).await {
                    eprintln!("server error: {err}");
                    std::process::exit(1);
                }
            }
            Err(err) => {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        },
        _ => {
            print_usage();
        }
    }
}
