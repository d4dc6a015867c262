use leptos::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use outbreak_shared::format::axis_label;
use outbreak_shared::source::DEFAULT_HISTORY_DAYS;
use outbreak_shared::timeline::value_range;
use outbreak_shared::{ChartPoint, Metric, StatsSource, daily_new_series};

use crate::api::HttpStatsSource;
use crate::app::DashboardState;
use crate::colors::rgba_css;
use crate::render_loop::RenderScheduler;

const PAD_LEFT: f64 = 44.0;
const PAD_RIGHT: f64 = 8.0;
const PAD_TOP: f64 = 8.0;
const PAD_BOTTOM: f64 = 22.0;
const AXIS: &str = "#9aa0ac";

/// Plot-area mapping for a series: index -> x, value -> y.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PlotScale {
    x0: f64,
    x_step: f64,
    y_base: f64,
    y_per_unit: f64,
    min: i64,
    max: i64,
}

impl PlotScale {
    fn new(points: &[ChartPoint], w: f64, h: f64) -> Option<Self> {
        let (min, max) = value_range(points)?;
        let min = min.min(0);
        let max = max.max(min + 1);
        let plot_w = (w - PAD_LEFT - PAD_RIGHT).max(1.0);
        let plot_h = (h - PAD_TOP - PAD_BOTTOM).max(1.0);
        let x_step = if points.len() > 1 {
            plot_w / (points.len() - 1) as f64
        } else {
            0.0
        };
        Some(Self {
            x0: PAD_LEFT,
            x_step,
            y_base: PAD_TOP + plot_h,
            y_per_unit: plot_h / (max - min) as f64,
            min,
            max,
        })
    }

    fn x(&self, index: usize) -> f64 {
        self.x0 + index as f64 * self.x_step
    }

    fn y(&self, value: i64) -> f64 {
        self.y_base - (value - self.min) as f64 * self.y_per_unit
    }
}

fn draw_chart(ctx: &CanvasRenderingContext2d, points: &[ChartPoint], metric: Metric, w: f64, h: f64) {
    ctx.clear_rect(0.0, 0.0, w, h);
    let Some(scale) = PlotScale::new(points, w, h) else {
        ctx.set_fill_style_str(AXIS);
        ctx.set_font("12px Inter, system-ui, sans-serif");
        ctx.fill_text("No data", w / 2.0 - 24.0, h / 2.0).ok();
        return;
    };

    // Axes and labels
    ctx.set_stroke_style_str(AXIS);
    ctx.set_line_width(1.0);
    ctx.begin_path();
    ctx.move_to(PAD_LEFT, PAD_TOP);
    ctx.line_to(PAD_LEFT, scale.y_base);
    ctx.line_to(w - PAD_RIGHT, scale.y_base);
    ctx.stroke();

    ctx.set_fill_style_str(AXIS);
    ctx.set_font("10px Inter, system-ui, sans-serif");
    ctx.fill_text(&axis_label(scale.max), 2.0, PAD_TOP + 8.0).ok();
    ctx.fill_text(&axis_label(scale.min), 2.0, scale.y_base).ok();
    if let (Some(first), Some(last)) = (points.first(), points.last()) {
        let first_label = first.date.format("%m/%d/%y").to_string();
        let last_label = last.date.format("%m/%d/%y").to_string();
        ctx.fill_text(&first_label, PAD_LEFT, h - 6.0).ok();
        ctx.fill_text(&last_label, w - PAD_RIGHT - 48.0, h - 6.0).ok();
    }

    let (r, g, b) = metric.color_rgb();
    let (fr, fg, fb) = metric.fill_rgb();

    // Area under the line
    ctx.begin_path();
    ctx.move_to(scale.x(0), scale.y_base);
    for (i, point) in points.iter().enumerate() {
        ctx.line_to(scale.x(i), scale.y(point.value));
    }
    ctx.line_to(scale.x(points.len() - 1), scale.y_base);
    ctx.close_path();
    ctx.set_fill_style_str(&rgba_css(fr, fg, fb, 0.35));
    ctx.fill();

    ctx.begin_path();
    for (i, point) in points.iter().enumerate() {
        let (x, y) = (scale.x(i), scale.y(point.value));
        if i == 0 {
            ctx.move_to(x, y);
        } else {
            ctx.line_to(x, y);
        }
    }
    ctx.set_stroke_style_str(&rgba_css(r, g, b, 1.0));
    ctx.set_line_width(1.5);
    ctx.stroke();
}

/// Worldwide daily-new line chart for the active metric.
///
/// Fetches its own series whenever the metric changes; only the latest
/// request is applied.
#[component]
pub fn TrendChart() -> impl IntoView {
    let DashboardState(dashboard) = expect_context();
    let metric = Memo::new(move |_| dashboard.with(|d| d.chart_view().metric));
    let points: RwSignal<Vec<ChartPoint>> = RwSignal::new(Vec::new());
    let fetch_nonce: RwSignal<u64> = RwSignal::new(0);

    Effect::new(move || {
        let metric = metric.get();
        let request_nonce = fetch_nonce.get_untracked().wrapping_add(1);
        fetch_nonce.set(request_nonce);

        spawn_local(async move {
            let fetched = HttpStatsSource.historical(DEFAULT_HISTORY_DAYS).await;
            if fetch_nonce.get_untracked() != request_nonce {
                return;
            }
            match fetched {
                Ok(timeline) => points.set(daily_new_series(&timeline, metric)),
                Err(e) => {
                    web_sys::console::warn_1(&format!("Historical fetch failed: {e}").into());
                }
            }
        });
    });

    let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
    let scheduler = RenderScheduler::new(move || {
        let Some(canvas) = canvas_ref.get_untracked() else {
            return;
        };
        let canvas: &HtmlCanvasElement = &canvas;
        let Some(parent) = canvas.parent_element() else {
            return;
        };
        let w = parent.client_width() as f64;
        let h = parent.client_height() as f64;
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let dpr = web_sys::window()
            .map(|w| w.device_pixel_ratio())
            .unwrap_or(1.0);
        let (pw, ph) = ((w * dpr).round() as u32, (h * dpr).round() as u32);
        if canvas.width() != pw || canvas.height() != ph {
            canvas.set_width(pw);
            canvas.set_height(ph);
        }
        let Some(ctx) = canvas
            .get_context("2d")
            .ok()
            .flatten()
            .and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok())
        else {
            return;
        };
        ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0).ok();
        let metric = metric.get_untracked();
        points.with_untracked(|points| draw_chart(&ctx, points, metric, w, h));
    });

    Effect::new(move || {
        points.track();
        metric.track();
        scheduler.mark_dirty();
    });

    view! {
        <div style="position: relative; width: 100%; height: 200px;">
            <canvas
                node_ref=canvas_ref
                style="position: absolute; inset: 0; width: 100%; height: 100%;"
            />
        </div>
    }
}
