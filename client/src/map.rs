use std::cell::Cell;
use std::f64::consts::TAU;
use std::rc::Rc;

use leptos::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, PointerEvent, WheelEvent};

use outbreak_shared::format::format_count;
use outbreak_shared::{LatLng, MapMarker, Scope};

use crate::app::{DashboardState, select_scope};
use crate::colors::{brighten, rgba_css};
use crate::render_loop::RenderScheduler;
use crate::viewport::MapCamera;

const BACKGROUND: &str = "#dfe6ec";
const GRATICULE: &str = "rgba(120,130,150,0.25)";
const MIN_BUBBLE_PX: f64 = 1.5;
const CLICK_SLOP_PX: f64 = 5.0;

/// Bubble radius on screen. Zero or negative counters draw nothing.
fn bubble_radius_px(marker: &MapMarker, camera: &MapCamera) -> f64 {
    if marker.radius_m <= 0.0 {
        return 0.0;
    }
    camera.metres_to_px(marker.radius_m).max(MIN_BUBBLE_PX)
}

/// Smallest bubble under the point, so small regions inside a larger
/// neighbour's bubble stay reachable.
fn hit_test<'a>(
    markers: &'a [MapMarker],
    camera: &MapCamera,
    x: f64,
    y: f64,
    w: f64,
    h: f64,
) -> Option<&'a MapMarker> {
    markers
        .iter()
        .filter_map(|marker| {
            let r = bubble_radius_px(marker, camera);
            if r <= 0.0 {
                return None;
            }
            let (mx, my) = camera.to_screen(marker.position, w, h);
            let (dx, dy) = (x - mx, y - my);
            (dx * dx + dy * dy <= r * r).then_some((r, marker))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, marker)| marker)
}

fn draw_graticule(ctx: &CanvasRenderingContext2d, camera: &MapCamera, w: f64, h: f64) {
    ctx.set_stroke_style_str(GRATICULE);
    ctx.set_line_width(1.0);
    ctx.begin_path();
    for step in (-180..=180).step_by(30) {
        let (x, _) = camera.to_screen(LatLng::new(0.0, step as f64), w, h);
        ctx.move_to(x, 0.0);
        ctx.line_to(x, h);
    }
    for step in (-90..=90).step_by(30) {
        let (_, y) = camera.to_screen(LatLng::new(step as f64, 0.0), w, h);
        ctx.move_to(0.0, y);
        ctx.line_to(w, y);
    }
    ctx.stroke();
}

fn draw_bubbles(ctx: &CanvasRenderingContext2d, markers: &[MapMarker], camera: &MapCamera, w: f64, h: f64) {
    // Largest first so smaller bubbles stay visible on top.
    let mut order: Vec<&MapMarker> = markers.iter().collect();
    order.sort_by(|a, b| b.radius_m.total_cmp(&a.radius_m));

    for marker in order {
        let r = bubble_radius_px(marker, camera);
        if r <= 0.0 {
            continue;
        }
        let (x, y) = camera.to_screen(marker.position, w, h);
        if x + r < 0.0 || y + r < 0.0 || x - r > w || y - r > h {
            continue;
        }

        let (fr, fg, fb) = marker.fill;
        let (sr, sg, sb) = marker.color;
        ctx.begin_path();
        if ctx.arc(x, y, r, 0.0, TAU).is_err() {
            continue;
        }
        ctx.set_fill_style_str(&rgba_css(fr, fg, fb, if marker.selected { 0.6 } else { 0.4 }));
        ctx.fill();
        if marker.selected {
            let (br, bg, bb) = brighten(sr, sg, sb, 1.2);
            ctx.set_stroke_style_str(&rgba_css(br, bg, bb, 1.0));
            ctx.set_line_width(2.5);
        } else {
            ctx.set_stroke_style_str(&rgba_css(sr, sg, sb, 0.9));
            ctx.set_line_width(1.0);
        }
        ctx.stroke();
    }
}

/// Canvas bubble map: one circle per region, sized and coloured by the active
/// metric. Clicking a bubble selects that region.
#[component]
pub fn BubbleMap() -> impl IntoView {
    let DashboardState(dashboard) = expect_context();

    let markers = Memo::new(move |_| dashboard.with(|d| d.map_view().markers()));
    let selection_viewport = Memo::new(move |_| dashboard.with(|d| d.selection().viewport));
    let camera: RwSignal<MapCamera> = RwSignal::new(MapCamera::default());
    let hovered: RwSignal<Option<(MapMarker, f64, f64)>> = RwSignal::new(None);

    let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
    let canvas_size: Rc<Cell<(f64, f64)>> = Rc::new(Cell::new((0.0, 0.0)));

    let size_render = canvas_size.clone();
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
        size_render.set((w, h));

        let Some(ctx) = canvas
            .get_context("2d")
            .ok()
            .flatten()
            .and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok())
        else {
            return;
        };
        ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0).ok();

        let cam = camera.get_untracked();
        ctx.set_fill_style_str(BACKGROUND);
        ctx.fill_rect(0.0, 0.0, w, h);
        draw_graticule(&ctx, &cam, w, h);
        markers.with_untracked(|markers| draw_bubbles(&ctx, markers, &cam, w, h));
    });
    let scheduler = Rc::new(scheduler);

    // Selection moved the viewport: follow it.
    Effect::new(move || {
        let viewport = selection_viewport.get();
        camera.set(MapCamera::from(viewport));
    });

    let sched_scene = scheduler.clone();
    Effect::new(move || {
        markers.track();
        camera.track();
        sched_scene.mark_dirty();
    });

    // --- Input handlers ---

    let is_dragging = Rc::new(Cell::new(false));
    let drag_start = Rc::new(Cell::new((0.0f64, 0.0f64)));
    let last_pos = Rc::new(Cell::new((0.0f64, 0.0f64)));

    let local_point = move |client_x: i32, client_y: i32| -> Option<(f64, f64)> {
        let canvas = canvas_ref.get_untracked()?;
        let rect = canvas.get_bounding_client_rect();
        Some((client_x as f64 - rect.left(), client_y as f64 - rect.top()))
    };

    let on_wheel = {
        let canvas_size = canvas_size.clone();
        move |e: WheelEvent| {
            e.prevent_default();
            let Some((x, y)) = local_point(e.client_x(), e.client_y()) else {
                return;
            };
            let (w, h) = canvas_size.get();
            camera.update(|cam| cam.zoom_at(e.delta_y(), x, y, w, h));
        }
    };

    let on_pointer_down = {
        let is_dragging = is_dragging.clone();
        let drag_start = drag_start.clone();
        let last_pos = last_pos.clone();
        move |e: PointerEvent| {
            is_dragging.set(true);
            let pos = (e.client_x() as f64, e.client_y() as f64);
            drag_start.set(pos);
            last_pos.set(pos);
            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.set_pointer_capture(e.pointer_id()).ok();
            }
        }
    };

    let on_pointer_move = {
        let is_dragging = is_dragging.clone();
        let last_pos = last_pos.clone();
        let canvas_size = canvas_size.clone();
        move |e: PointerEvent| {
            if is_dragging.get() {
                let (lx, ly) = last_pos.get();
                let pos = (e.client_x() as f64, e.client_y() as f64);
                last_pos.set(pos);
                camera.update(|cam| cam.pan(pos.0 - lx, pos.1 - ly));
                return;
            }
            let Some((x, y)) = local_point(e.client_x(), e.client_y()) else {
                return;
            };
            let (w, h) = canvas_size.get();
            let cam = camera.get_untracked();
            let hit = markers.with_untracked(|markers| {
                hit_test(markers, &cam, x, y, w, h).cloned()
            });
            match hit {
                Some(marker) => hovered.set(Some((marker, x, y))),
                None => {
                    if hovered.with_untracked(Option::is_some) {
                        hovered.set(None);
                    }
                }
            }
        }
    };

    let on_pointer_up = {
        let is_dragging = is_dragging.clone();
        move |_: PointerEvent| is_dragging.set(false)
    };

    let on_pointer_leave = move |_: PointerEvent| {
        if hovered.with_untracked(Option::is_some) {
            hovered.set(None);
        }
    };

    let on_click = {
        let drag_start = drag_start.clone();
        let canvas_size = canvas_size.clone();
        move |e: MouseEvent| {
            let (sx, sy) = drag_start.get();
            if (e.client_x() as f64 - sx).abs() >= CLICK_SLOP_PX
                || (e.client_y() as f64 - sy).abs() >= CLICK_SLOP_PX
            {
                return;
            }
            let Some((x, y)) = local_point(e.client_x(), e.client_y()) else {
                return;
            };
            let (w, h) = canvas_size.get();
            let cam = camera.get_untracked();
            let code = markers.with_untracked(|markers| {
                hit_test(markers, &cam, x, y, w, h).and_then(|m| m.code.clone())
            });
            let Some(code) = code else {
                return;
            };
            let scope = Scope::Country(code);
            if !dashboard.with_untracked(|d| d.needs_scope_change(&scope)) {
                return;
            }
            select_scope(dashboard, scope);
        }
    };

    let metric_label = Memo::new(move |_| dashboard.with(|d| d.map_view().metric.as_str()));

    view! {
        <div
            style="position: relative; width: 100%; height: 100%; overflow: hidden;"
            on:wheel=on_wheel
            on:pointerdown=on_pointer_down
            on:pointermove=on_pointer_move
            on:pointerup=on_pointer_up
            on:pointerleave=on_pointer_leave
            on:click=on_click
        >
            <canvas
                node_ref=canvas_ref
                style="position: absolute; inset: 0; width: 100%; height: 100%; touch-action: none; cursor: grab;"
            />
            {move || {
                hovered.get().map(|(marker, x, y)| {
                    let MapMarker { name, value, flag, details, .. } = marker;
                    view! {
                        <div
                            style="position: absolute; pointer-events: none; background: #ffffff; border-radius: 6px; padding: 6px 10px; box-shadow: 0 2px 8px rgba(0,0,0,0.25); font-size: 0.8rem; white-space: nowrap;"
                            style:left=format!("{}px", x + 12.0)
                            style:top=format!("{}px", y - 8.0)
                        >
                            <div style="display: flex; align-items: center; gap: 6px; font-weight: 700;">
                                {flag.map(|src| view! { <img src=src alt="" style="height: 12px;" /> })}
                                {name}
                            </div>
                            <div style="color: #555;">
                                {format!("{}: {}", metric_label.get_untracked(), format_count(value))}
                            </div>
                            {details
                                .into_iter()
                                .map(|(label, text)| {
                                    view! { <div style="color: #777;">{format!("{label}: {text}")}</div> }
                                })
                                .collect_view()}
                        </div>
                    }
                })
            }}
        </div>
    }
}
