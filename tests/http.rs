use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct Session {
    token: String,
}

#[derive(Debug, Deserialize)]
struct HabitBody {
    id: String,
    target_value: u32,
}

#[derive(Debug, Deserialize)]
struct CheckIn {
    count: u32,
    intensity_level: u8,
}

#[derive(Debug, Deserialize)]
struct Cell {
    date: String,
    count: u32,
    day_of_week: u8,
    intensity_level: u8,
    in_range: bool,
}

#[derive(Debug, Deserialize)]
struct Grid {
    weeks: Vec<Vec<Cell>>,
    legend: Vec<Value>,
    end_date: String,
}

impl Grid {
    fn cell(&self, date: &str) -> &Cell {
        self.weeks
            .iter()
            .flatten()
            .find(|cell| cell.date == date)
            .expect("missing cell")
    }
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_suffix() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}_{}", std::process::id(), nanos)
}

fn unique_data_path() -> String {
    let mut path = std::env::temp_dir();
    path.push(format!("habitflow_http_{}.json", unique_suffix()));
    path.to_string_lossy().to_string()
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let data_path = unique_data_path();
    let child = Command::new(env!("CARGO_BIN_EXE_habitflow"))
        .env("PORT", port.to_string())
        .env("APP_DATA_PATH", data_path)
        .env("RUST_LOG", "info")
        .env_remove("API_KEY")
        .env_remove("GEMINI_API_KEY")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn register(client: &Client, base_url: &str) -> String {
    let session: Session = client
        .post(format!("{base_url}/api/auth/register"))
        .json(&json!({ "username": format!("user_{}", unique_suffix()), "password": "pw" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    session.token
}

#[tokio::test]
async fn http_requires_a_session() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/api/data", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .get(format!("{}/api/data", server.base_url))
        .bearer_auth("not-a-session")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn http_manual_check_in_updates_heatmap() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let token = register(&client, &server.base_url).await;

    let habit: HabitBody = client
        .post(format!("{}/api/habits", server.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "name": "Stretch",
            "is_manual": true,
            "color": "#22c55e",
            "start_date": "2024-01-01",
            "duration_value": 7,
            "duration_unit": "day",
            "target_value": 2
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(habit.target_value, 2);

    let check_in_url = format!("{}/api/habits/{}/check-in", server.base_url, habit.id);
    let first: CheckIn = client
        .post(&check_in_url)
        .bearer_auth(&token)
        .json(&json!({ "date": "2024-01-03" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first.count, 1);
    assert_eq!(first.intensity_level, 2);

    let second: CheckIn = client
        .post(&check_in_url)
        .bearer_auth(&token)
        .json(&json!({ "date": "2024-01-03" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second.count, 2);
    assert_eq!(second.intensity_level, 4);

    let outside = client
        .post(&check_in_url)
        .bearer_auth(&token)
        .json(&json!({ "date": "2023-12-31" }))
        .send()
        .await
        .unwrap();
    assert_eq!(outside.status(), StatusCode::BAD_REQUEST);

    let grid: Grid = client
        .get(format!("{}/api/habits/{}/heatmap", server.base_url, habit.id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(grid.weeks[0][0].date, "2023-12-31");
    assert_eq!(grid.weeks[0][0].day_of_week, 0);
    assert!(!grid.weeks[0][0].in_range);
    assert!(grid.weeks.iter().all(|week| week.len() == 7));
    assert_eq!(grid.cell("2024-01-03").count, 2);
    assert_eq!(grid.cell("2024-01-03").intensity_level, 4);
    assert!(!grid.cell("2024-01-08").in_range);
    assert_eq!(grid.end_date, "2024-01-08");
    assert_eq!(grid.legend.len(), 3);
}

#[tokio::test]
async fn http_completed_todos_feed_task_habits() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let token = register(&client, &server.base_url).await;

    let todo: Value = client
        .post(format!("{}/api/todos", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "text": "Outline post", "habit": "Blog" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let habit_id = todo["habit_id"].as_str().expect("todo linked").to_string();
    let todo_id = todo["id"].as_str().unwrap().to_string();
    let date = todo["date"].as_str().unwrap().to_string();

    let response = client
        .post(format!("{}/api/todos/{todo_id}/toggle", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let grid: Grid = client
        .get(format!("{}/api/habits/{habit_id}/heatmap", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let today = grid.cell(&date);
    assert_eq!(today.count, 1);
    assert_eq!(today.intensity_level, 4);
    assert!(today.in_range);

    let manual = client
        .post(format!("{}/api/habits/{habit_id}/check-in", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "date": date }))
        .send()
        .await
        .unwrap();
    assert_eq!(manual.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_coach_needs_api_key() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let token = register(&client, &server.base_url).await;

    let response = client
        .post(format!("{}/api/coach/analyze", server.base_url))
        .bearer_auth(&token)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn http_preferences_default_and_round_trip() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let token = register(&client, &server.base_url).await;
    let url = format!("{}/api/preferences", server.base_url);

    let defaults: Value = client
        .get(&url)
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        defaults,
        json!({ "theme": "dark", "custom_color": "#0f172a", "language": "en" })
    );

    let wanted = json!({ "theme": "custom", "custom_color": "#336699", "language": "zh" });
    let response = client
        .put(&url)
        .bearer_auth(&token)
        .json(&wanted)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let stored: Value = client
        .get(&url)
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored, wanted);

    let rejected = client
        .put(&url)
        .bearer_auth(&token)
        .json(&json!({ "theme": "custom", "custom_color": "red", "language": "en" }))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

    let unchanged: Value = client
        .get(&url)
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unchanged, wanted);
}

#[tokio::test]
async fn http_visibility_and_foreign_habits() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let owner = register(&client, &server.base_url).await;
    let stranger = register(&client, &server.base_url).await;

    let habit: HabitBody = client
        .post(format!("{}/api/habits", server.base_url))
        .bearer_auth(&owner)
        .json(&json!({
            "name": "Walk",
            "is_manual": true,
            "start_date": "2024-01-01",
            "duration_value": 7,
            "duration_unit": "day"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let visibility_url = format!("{}/api/habits/{}/visibility", server.base_url, habit.id);

    let hidden: Value = client
        .put(&visibility_url)
        .bearer_auth(&owner)
        .json(&json!({ "visible": false }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(hidden["is_visible_on_dashboard"], json!(false));

    let data: Value = client
        .get(format!("{}/api/data", server.base_url))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let listed = data["habits"]
        .as_array()
        .unwrap()
        .iter()
        .find(|entry| entry["id"] == json!(habit.id))
        .expect("habit listed");
    assert_eq!(listed["is_visible_on_dashboard"], json!(false));

    let foreign = [
        client
            .put(&visibility_url)
            .bearer_auth(&stranger)
            .json(&json!({ "visible": true })),
        client
            .post(format!("{}/api/habits/{}/check-in", server.base_url, habit.id))
            .bearer_auth(&stranger)
            .json(&json!({ "date": "2024-01-02" })),
        client
            .get(format!("{}/api/habits/{}/heatmap", server.base_url, habit.id))
            .bearer_auth(&stranger),
        client
            .delete(format!("{}/api/habits/{}", server.base_url, habit.id))
            .bearer_auth(&stranger),
    ];
    for request in foreign {
        let response = request.send().await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    let stranger_data: Value = client
        .get(format!("{}/api/data", server.base_url))
        .bearer_auth(&stranger)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stranger_data["habits"], json!([]));

    let still_hidden: Value = client
        .get(format!("{}/api/data", server.base_url))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        still_hidden["habits"][0]["is_visible_on_dashboard"],
        json!(false)
    );
}

#[tokio::test]
async fn http_partial_category_order_is_rejected() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let token = register(&client, &server.base_url).await;

    let mut ids = Vec::new();
    for name in ["A", "B", "C"] {
        let category: Value = client
            .post(format!("{}/api/categories", server.base_url))
            .bearer_auth(&token)
            .json(&json!({ "name": name }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        ids.push(category["id"].as_str().unwrap().to_string());
    }
    let order_url = format!("{}/api/categories/order", server.base_url);

    let partial = client
        .put(&order_url)
        .bearer_auth(&token)
        .json(&json!({ "ids": [ids[2]] }))
        .send()
        .await
        .unwrap();
    assert_eq!(partial.status(), StatusCode::BAD_REQUEST);

    let ordered: Vec<Value> = client
        .put(&order_url)
        .bearer_auth(&token)
        .json(&json!({ "ids": [ids[2], ids[0], ids[1]] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = ordered
        .iter()
        .map(|category| category["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["C", "A", "B"]);
}
