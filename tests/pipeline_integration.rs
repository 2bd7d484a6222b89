//! End-to-end pipeline tests against a mock stats API and an in-memory
//! database: reconciliation, idempotent re-runs, and failure isolation.

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hoopline::etl::retry::RetryPolicy;
use hoopline::etl::LoadOptions;
use hoopline::pipeline::{run_daily, run_season};
use hoopline::{NbaApiClient, Storage};

const SEASON: &str = "2024-25";
const HOME_TEAM: i64 = 1610612750;
const AWAY_TEAM: i64 = 1610612747;

fn fast_options(log_dir: &std::path::Path) -> LoadOptions {
    LoadOptions {
        sleep_seconds: 0.0,
        limit: None,
        retry: RetryPolicy {
            max_retries: 1,
            backoff_seconds: vec![0],
            max_total_wait: std::time::Duration::from_secs(1),
        },
        rebound_tolerance: 5,
        log_dir: log_dir.to_path_buf(),
    }
}

fn game_finder_doc(game_ids: &[&str]) -> Value {
    let rows: Vec<Value> = game_ids
        .iter()
        .flat_map(|id| {
            [
                json!(["22024", HOME_TEAM, id, "W"]),
                json!(["22024", AWAY_TEAM, id, "L"]),
            ]
        })
        .collect();
    json!({
        "resultSets": [{
            "name": "LeagueGameFinderResults",
            "headers": ["SEASON_ID", "TEAM_ID", "GAME_ID", "WL"],
            "rowSet": rows
        }]
    })
}

fn summary_doc(game_id: &str) -> Value {
    json!({
        "boxScoreSummary": {
            "gameId": game_id,
            "homeTeamId": HOME_TEAM,
            "awayTeamId": AWAY_TEAM,
            "gameTimeUTC": "2024-11-01T23:30:00Z",
            "gameStatusText": "Final",
            "arena": {"arenaName": "Target Center", "arenaCity": "Minneapolis", "arenaState": "MN"},
            "homeTeam": {
                "teamId": HOME_TEAM,
                "teamCity": "Minnesota",
                "teamName": "Timberwolves",
                "teamTricode": "MIN"
            },
            "awayTeam": {
                "teamId": AWAY_TEAM,
                "teamCity": "Los Angeles",
                "teamName": "Lakers",
                "teamTricode": "LAL"
            }
        }
    })
}

fn traditional_doc(game_id: &str) -> Value {
    json!({
        "boxScoreTraditional": {
            "gameId": game_id,
            "homeTeam": {
                "teamId": HOME_TEAM,
                "statistics": {
                    "points": 110, "fieldGoalsMade": 41, "fieldGoalsAttempted": 88,
                    "reboundsOffensive": 10, "reboundsDefensive": 33, "reboundsTotal": 45
                },
                "players": [{
                    "personId": 1630162,
                    "firstName": "Anthony",
                    "familyName": "Edwards",
                    "position": "G",
                    "statistics": {"minutes": "36:12", "points": 32, "reboundsTotal": 6}
                }]
            },
            "awayTeam": {
                "teamId": AWAY_TEAM,
                "statistics": {"points": 104, "fieldGoalsMade": 38, "fieldGoalsAttempted": 90},
                "players": [{
                    "personId": 2544,
                    "firstName": "LeBron",
                    "familyName": "James",
                    "position": "F",
                    "statistics": {"minutes": "38:01", "points": 28, "reboundsTotal": 9}
                }]
            }
        }
    })
}

fn advanced_doc(game_id: &str) -> Value {
    json!({
        "boxScoreAdvanced": {
            "gameId": game_id,
            "homeTeam": {
                "teamId": HOME_TEAM,
                "statistics": {"offensiveRating": 114.6, "defensiveRating": 108.3, "pace": 98.5}
            },
            "awayTeam": {
                "teamId": AWAY_TEAM,
                "statistics": {"offensiveRating": 108.3, "defensiveRating": 114.6, "pace": 98.5}
            }
        }
    })
}

async fn mount_game(server: &MockServer, game_id: &str) {
    Mock::given(method("GET"))
        .and(path("/boxscoresummaryv3"))
        .and(query_param("GameID", game_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(summary_doc(game_id)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/boxscoretraditionalv3"))
        .and(query_param("GameID", game_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(traditional_doc(game_id)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/boxscoreadvancedv3"))
        .and(query_param("GameID", game_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(advanced_doc(game_id)))
        .mount(server)
        .await;
}

async fn mount_game_finder(server: &MockServer, game_ids: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/leaguegamefinder"))
        .and(query_param("Season", SEASON))
        .respond_with(ResponseTemplate::new(200).set_body_json(game_finder_doc(game_ids)))
        .mount(server)
        .await;
}

async fn count(storage: &Storage, table: &str) -> i64 {
    let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(storage.pool())
        .await
        .unwrap();
    n
}

#[tokio::test]
async fn test_full_season_run_and_idempotent_rerun() {
    let server = MockServer::start().await;
    mount_game_finder(&server, &["0022400123"]).await;
    mount_game(&server, "0022400123").await;

    let storage = Storage::connect_in_memory().await.unwrap();
    storage.init_schema().await.unwrap();
    let client = NbaApiClient::with_base_url(server.uri()).unwrap();
    let log_dir = tempfile::tempdir().unwrap();
    let options = fast_options(log_dir.path());

    let summary = run_season(&client, &storage, SEASON, &options).await.unwrap();
    assert!(summary.is_clean());
    assert_eq!(summary.spine_attempted, 1);
    assert_eq!(summary.spine_inserted, 1);
    assert_eq!(summary.structure.succeeded, 1);
    assert_eq!(summary.team_box.succeeded, 1);
    assert_eq!(summary.player_box.succeeded, 1);

    assert_eq!(count(&storage, "spine").await, 1);
    assert_eq!(count(&storage, "games").await, 1);
    assert_eq!(count(&storage, "teams").await, 2);
    assert_eq!(count(&storage, "team_boxscores").await, 2);
    assert_eq!(count(&storage, "players").await, 2);
    assert_eq!(count(&storage, "player_boxscores").await, 2);

    let (home_pts,): (i64,) = sqlx::query_as(
        "SELECT pts FROM team_boxscores WHERE game_id = ? AND team_id = ?",
    )
    .bind("0022400123")
    .bind(HOME_TEAM)
    .fetch_one(storage.pool())
    .await
    .unwrap();
    assert_eq!(home_pts, 110);

    let (full_name,): (Option<String>,) =
        sqlx::query_as("SELECT full_name FROM teams WHERE team_id = ?")
            .bind(HOME_TEAM)
            .fetch_one(storage.pool())
            .await
            .unwrap();
    assert_eq!(full_name.as_deref(), Some("Minnesota Timberwolves"));

    // Second run finds nothing missing and touches nothing.
    let rerun = run_season(&client, &storage, SEASON, &options).await.unwrap();
    assert_eq!(rerun.spine_inserted, 0);
    assert_eq!(rerun.structure.attempted, 0);
    assert_eq!(rerun.team_box.attempted, 0);
    assert_eq!(rerun.player_box.attempted, 0);
    assert_eq!(count(&storage, "games").await, 1);
    assert_eq!(count(&storage, "player_boxscores").await, 2);
}

#[tokio::test]
async fn test_one_bad_game_does_not_abort_the_batch() {
    let server = MockServer::start().await;
    mount_game_finder(&server, &["0022400001", "0022400002"]).await;
    mount_game(&server, "0022400002").await;
    // The first game's summary endpoint is permanently broken.
    Mock::given(method("GET"))
        .and(path("/boxscoresummaryv3"))
        .and(query_param("GameID", "0022400001"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let storage = Storage::connect_in_memory().await.unwrap();
    storage.init_schema().await.unwrap();
    let client = NbaApiClient::with_base_url(server.uri()).unwrap();
    let log_dir = tempfile::tempdir().unwrap();
    let options = fast_options(log_dir.path());

    let summary = run_season(&client, &storage, SEASON, &options).await.unwrap();
    assert!(!summary.is_clean());
    assert_eq!(summary.structure.attempted, 2);
    assert_eq!(summary.structure.succeeded, 1);
    assert_eq!(summary.structure.failed, 1);
    // The healthy game flowed through the whole pipeline.
    assert_eq!(summary.team_box.succeeded, 1);
    assert_eq!(summary.player_box.succeeded, 1);

    // The failure is in the ledger and the stage failure log.
    let failed = hoopline::etl::errors::failed_game_ids(&storage, "load_games", None)
        .await
        .unwrap();
    assert_eq!(failed, vec!["0022400001".to_string()]);
    let log = std::fs::read_to_string(log_dir.path().join("failed_games.txt")).unwrap();
    assert!(log.contains("0022400001\tApiNotFound"));

    // The broken game is still missing, so a later run retries exactly it.
    let missing = storage.missing_games(SEASON).await.unwrap();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].game_id, "0022400001");
}

#[tokio::test]
async fn test_recovered_game_resolves_ledger_entries() {
    let server = MockServer::start().await;
    mount_game_finder(&server, &["0022400777"]).await;
    // Fails on the first pass.
    Mock::given(method("GET"))
        .and(path("/boxscoresummaryv3"))
        .and(query_param("GameID", "0022400777"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_game(&server, "0022400777").await;

    let storage = Storage::connect_in_memory().await.unwrap();
    storage.init_schema().await.unwrap();
    let client = NbaApiClient::with_base_url(server.uri()).unwrap();
    let log_dir = tempfile::tempdir().unwrap();
    let options = fast_options(log_dir.path());

    let first = run_season(&client, &storage, SEASON, &options).await.unwrap();
    assert_eq!(first.structure.failed, 1);
    assert_eq!(
        hoopline::etl::errors::unresolved_count(&storage, "load_games")
            .await
            .unwrap(),
        1
    );

    // The endpoint recovered; the re-run backfills and resolves the entry.
    let second = run_season(&client, &storage, SEASON, &options).await.unwrap();
    assert!(second.is_clean());
    assert_eq!(second.structure.succeeded, 1);
    assert_eq!(
        hoopline::etl::errors::unresolved_count(&storage, "load_games")
            .await
            .unwrap(),
        0
    );
    assert_eq!(count(&storage, "games").await, 1);
}

#[tokio::test]
async fn test_daily_pass_with_failures_still_completes() {
    let server = MockServer::start().await;
    mount_game_finder(&server, &["0022400001", "0022400002"]).await;
    mount_game(&server, "0022400002").await;
    Mock::given(method("GET"))
        .and(path("/boxscoresummaryv3"))
        .and(query_param("GameID", "0022400001"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let storage = Storage::connect_in_memory().await.unwrap();
    storage.init_schema().await.unwrap();
    let client = NbaApiClient::with_base_url(server.uri()).unwrap();
    let log_dir = tempfile::tempdir().unwrap();
    let options = fast_options(log_dir.path());

    // A broken game is counted and ledgered, not propagated: the daily
    // pass runs to completion and the next pass picks the game up.
    let summary = run_daily(&client, &storage, Some(SEASON), &options)
        .await
        .unwrap();
    assert!(!summary.is_clean());
    assert_eq!(summary.structure.failed, 1);
    assert_eq!(summary.structure.succeeded, 1);
    assert_eq!(summary.season, SEASON);
}

#[tokio::test]
async fn test_broken_ledger_does_not_abort_a_pass() {
    let server = MockServer::start().await;
    mount_game_finder(&server, &["0022400123", "0022400124"]).await;
    mount_game(&server, "0022400123").await;
    mount_game(&server, "0022400124").await;

    let storage = Storage::connect_in_memory().await.unwrap();
    storage.init_schema().await.unwrap();
    // Every ledger statement fails from here on.
    sqlx::query("DROP TABLE etl_errors")
        .execute(storage.pool())
        .await
        .unwrap();

    let client = NbaApiClient::with_base_url(server.uri()).unwrap();
    let log_dir = tempfile::tempdir().unwrap();
    let options = fast_options(log_dir.path());

    // Ledger bookkeeping is best effort on both the write and the resolve
    // path, so the pass still loads everything.
    let summary = run_season(&client, &storage, SEASON, &options).await.unwrap();
    assert!(summary.is_clean());
    assert_eq!(summary.structure.succeeded, 2);
    assert_eq!(summary.team_box.succeeded, 2);
    assert_eq!(summary.player_box.succeeded, 2);
    assert_eq!(count(&storage, "games").await, 2);
    assert_eq!(count(&storage, "team_boxscores").await, 4);
}

#[tokio::test]
async fn test_limit_caps_a_pass() {
    let server = MockServer::start().await;
    mount_game_finder(&server, &["0022400001", "0022400002", "0022400003"]).await;
    for id in ["0022400001", "0022400002", "0022400003"] {
        mount_game(&server, id).await;
    }

    let storage = Storage::connect_in_memory().await.unwrap();
    storage.init_schema().await.unwrap();
    let client = NbaApiClient::with_base_url(server.uri()).unwrap();
    let log_dir = tempfile::tempdir().unwrap();
    let mut options = fast_options(log_dir.path());
    options.limit = Some(2);

    let summary = run_season(&client, &storage, SEASON, &options).await.unwrap();
    assert_eq!(summary.spine_inserted, 3);
    assert_eq!(summary.structure.attempted, 2);
    // Boxscore stages only see structured games, themselves capped at two.
    assert_eq!(summary.team_box.attempted, 2);
    assert_eq!(count(&storage, "games").await, 2);
    assert_eq!(storage.missing_games(SEASON).await.unwrap().len(), 1);
}
