use crate::heatmap::{DayCell, HeatmapGrid};
use crate::models::{ColorSpec, Habit};

const EMPTY_SWATCH: &str = "#e2e8f0";

pub fn render_index(date: &str) -> String {
    INDEX_HTML.replace("{{DATE}}", date)
}

/// Standalone heatmap fragment for one habit: week columns, legend and the
/// window's start/end footer.
pub fn render_heatmap(habit: &Habit, grid: &HeatmapGrid) -> String {
    let mut html = String::new();
    html.push_str(&format!(
        r#"<section class="heatmap" data-habit="{id}"><h3>{name}</h3><div class="weeks">"#,
        id = escape(&habit.id),
        name = escape(&habit.name),
    ));

    for week in &grid.weeks {
        html.push_str(r#"<div class="week">"#);
        let label = week.iter().find_map(|cell| cell.month_label.as_deref());
        html.push_str(&format!(
            r#"<span class="month">{}</span>"#,
            label.unwrap_or("")
        ));
        for cell in week {
            render_cell(&mut html, cell, &habit.color, habit.is_manual);
        }
        html.push_str("</div>");
    }
    html.push_str("</div>");

    html.push_str(r#"<div class="legend"><span>Less</span>"#);
    for swatch in &grid.legend {
        html.push_str(&format!(
            r#"<span class="cell" title="Count: {}" style="{}"></span>"#,
            swatch.count,
            swatch_style(&habit.color, swatch.level),
        ));
    }
    html.push_str("<span>More</span></div>");

    html.push_str(&format!(
        r#"<footer><span title="{start}">Start {start}</span><span title="{end}">End {end}</span></footer></section>"#,
        start = grid.start_date,
        end = grid.end_date,
    ));
    html
}

fn render_cell(html: &mut String, cell: &DayCell, color: &ColorSpec, interactive: bool) {
    if !cell.in_range {
        html.push_str(r#"<span class="cell hidden"></span>"#);
        return;
    }
    let class = if interactive { "cell clickable" } else { "cell" };
    html.push_str(&format!(
        r#"<span class="{class}" data-date="{date}" title="{date}: {count} activities" style="{style}"></span>"#,
        date = cell.date,
        count = cell.count,
        style = swatch_style(color, cell.intensity_level),
    ));
}

/// Inline CSS for one intensity tier of a habit colour.
pub fn swatch_style(color: &ColorSpec, level: u8) -> String {
    if level == 0 {
        return format!("background:{EMPTY_SWATCH}");
    }
    match color {
        ColorSpec::Hex { value } => {
            let opacity = 0.2 + f32::from(level.min(4)) * 0.2;
            format!("background:{value};opacity:{opacity:.1}")
        }
        ColorSpec::Named { name } => {
            let ramp = palette(name);
            format!("background:{}", ramp[usize::from(level.clamp(1, 4)) - 1])
        }
    }
}

/// Four shades per palette colour, lightest first.
fn palette(name: &str) -> [&'static str; 4] {
    match name {
        "green" => ["#bbf7d0", "#86efac", "#4ade80", "#16a34a"],
        "emerald" => ["#a7f3d0", "#6ee7b7", "#34d399", "#059669"],
        "red" => ["#fecaca", "#fca5a5", "#f87171", "#dc2626"],
        "orange" => ["#fed7aa", "#fdba74", "#fb923c", "#ea580c"],
        "yellow" => ["#fef08a", "#fde047", "#facc15", "#ca8a04"],
        "purple" => ["#e9d5ff", "#d8b4fe", "#c084fc", "#9333ea"],
        "pink" => ["#fbcfe8", "#f9a8d4", "#f472b6", "#db2777"],
        "indigo" => ["#c7d2fe", "#a5b4fc", "#818cf8", "#4f46e5"],
        "teal" => ["#99f6e4", "#5eead4", "#2dd4bf", "#0d9488"],
        "cyan" => ["#a5f3fc", "#67e8f9", "#22d3ee", "#0891b2"],
        _ => ["#bfdbfe", "#93c5fd", "#60a5fa", "#2563eb"],
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>HabitFlow</title>
  <style>
    :root {
      --bg: #0f172a;
      --surface: #1e293b;
      --ink: #e2e8f0;
      --muted: #94a3b8;
      --accent: #3b82f6;
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: var(--bg);
      color: var(--ink);
      font-family: "Inter", "Segoe UI", sans-serif;
      padding: 32px 18px;
    }

    main {
      width: min(960px, 100%);
      margin: 0 auto;
      display: grid;
      gap: 24px;
    }

    form {
      display: flex;
      gap: 8px;
      flex-wrap: wrap;
    }

    input, button {
      font: inherit;
      padding: 8px 12px;
      border-radius: 8px;
      border: 1px solid #334155;
      background: var(--surface);
      color: var(--ink);
    }

    button {
      background: var(--accent);
      border: none;
      cursor: pointer;
    }

    .heatmap {
      background: var(--surface);
      border-radius: 16px;
      padding: 16px;
      overflow-x: auto;
    }

    .weeks {
      display: flex;
      gap: 4px;
      padding-top: 16px;
    }

    .week {
      display: flex;
      flex-direction: column;
      gap: 4px;
      position: relative;
    }

    .month {
      position: absolute;
      top: -16px;
      font-size: 10px;
      color: var(--muted);
      white-space: nowrap;
    }

    .cell {
      display: inline-block;
      width: 12px;
      height: 12px;
      border-radius: 3px;
    }

    .cell.hidden {
      visibility: hidden;
    }

    .cell.clickable {
      cursor: pointer;
    }

    .legend, footer {
      display: flex;
      gap: 4px;
      justify-content: flex-end;
      align-items: center;
      font-size: 10px;
      color: var(--muted);
      margin-top: 8px;
    }

    footer {
      justify-content: space-between;
    }

    .status {
      color: var(--muted);
      min-height: 1.2em;
    }
  </style>
</head>
<body>
  <main>
    <header>
      <h1>HabitFlow</h1>
      <p class="status">Today is {{DATE}}.</p>
    </header>

    <form id="auth-form">
      <input id="username" placeholder="Username" autocomplete="username" />
      <input id="password" type="password" placeholder="Password" autocomplete="current-password" />
      <button type="submit" data-action="login">Sign in</button>
      <button type="submit" data-action="register">Register</button>
    </form>

    <div class="status" id="status"></div>
    <section id="habits"></section>
  </main>

  <script>
    const statusEl = document.getElementById('status');
    const habitsEl = document.getElementById('habits');
    let token = sessionStorage.getItem('habitflow_token');

    const api = (path, options = {}) => fetch(path, {
      ...options,
      headers: {
        'Content-Type': 'application/json',
        ...(token ? { Authorization: `Bearer ${token}` } : {}),
      },
    });

    const loadHabits = async () => {
      const response = await api('/api/data');
      if (!response.ok) {
        statusEl.textContent = 'Sign in to see your habits.';
        return;
      }
      const data = await response.json();
      habitsEl.innerHTML = '';
      for (const habit of data.habits.filter((h) => h.is_visible_on_dashboard)) {
        const fragment = await api(`/habits/${habit.id}/heatmap`);
        habitsEl.insertAdjacentHTML('beforeend', await fragment.text());
      }
      statusEl.textContent = `${data.habits.length} habits`;
    };

    document.getElementById('auth-form').addEventListener('submit', async (event) => {
      event.preventDefault();
      const action = event.submitter.dataset.action;
      const response = await api(`/api/auth/${action}`, {
        method: 'POST',
        body: JSON.stringify({
          username: document.getElementById('username').value,
          password: document.getElementById('password').value,
        }),
      });
      if (!response.ok) {
        statusEl.textContent = await response.text();
        return;
      }
      token = (await response.json()).token;
      sessionStorage.setItem('habitflow_token', token);
      loadHabits();
    });

    habitsEl.addEventListener('click', async (event) => {
      const cell = event.target.closest('.cell.clickable');
      if (!cell) {
        return;
      }
      const habitId = cell.closest('.heatmap').dataset.habit;
      const response = await api(`/api/habits/${habitId}/check-in`, {
        method: 'POST',
        body: JSON.stringify({ date: cell.dataset.date }),
      });
      if (response.ok) {
        loadHabits();
      }
    });

    if (token) {
      loadHabits();
    }
  </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heatmap::build_grid;
    use std::collections::BTreeMap;

    fn habit(color: ColorSpec, is_manual: bool) -> Habit {
        Habit {
            id: "h1".into(),
            user_id: "u1".into(),
            name: "Read <daily>".into(),
            category_id: "c1".into(),
            color,
            is_manual,
            logs: BTreeMap::from([("2024-01-02".to_string(), 1)]),
            description: None,
            start_date: "2024-01-01".into(),
            duration_days: 7,
            is_visible_on_dashboard: true,
            target_value: 1,
            daily_reminder: false,
        }
    }

    #[test]
    fn swatches_follow_colour_kind() {
        let hex = ColorSpec::Hex {
            value: "#ff0000".into(),
        };
        assert_eq!(swatch_style(&hex, 0), "background:#e2e8f0");
        assert_eq!(swatch_style(&hex, 1), "background:#ff0000;opacity:0.4");
        assert_eq!(swatch_style(&hex, 4), "background:#ff0000;opacity:1.0");

        let named = ColorSpec::Named {
            name: "green".into(),
        };
        assert_eq!(swatch_style(&named, 4), "background:#16a34a");
        let unknown = ColorSpec::Named {
            name: "mauve".into(),
        };
        assert_eq!(swatch_style(&unknown, 1), "background:#bfdbfe");
    }

    #[test]
    fn fragment_hides_out_of_range_cells() {
        let habit = habit(ColorSpec::default(), true);
        let grid = build_grid(&habit.logs, &habit.start_date, habit.duration_days, 1).unwrap();
        let html = render_heatmap(&habit, &grid);

        assert!(html.contains("Read &lt;daily&gt;"));
        assert_eq!(html.matches("cell clickable").count(), 7);
        assert!(!html.contains(r#"data-date="2023-12-31""#));
        assert!(html.contains(r#"data-date="2024-01-02""#));
        assert!(html.contains("End 2024-01-08"));
    }

    #[test]
    fn task_habits_are_not_clickable() {
        let habit = habit(ColorSpec::default(), false);
        let grid = build_grid(&habit.logs, &habit.start_date, habit.duration_days, 1).unwrap();
        assert!(!render_heatmap(&habit, &grid).contains("clickable"));
    }
}
