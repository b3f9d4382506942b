use std::sync::Arc;
use std::time::Duration;

use eframe::egui::epaint::QuadraticBezierShape;
use eframe::egui::{
    self, Align2, Color32, FontId, Galley, Painter, Pos2, Rect, Response, Sense, Shape, Stroke,
    StrokeKind, Ui, Vec2, vec2,
};

use crate::story::NodeContent;
use crate::util::truncate_label;

use super::super::render_utils::{
    CARD_FILL, CARD_STROKE, LABEL_COLOR, LINK_COLOR, PINNED_COLOR, SELECTED_COLOR, blend_color,
    dim_color, draw_background, edge_visible,
};
use super::super::transform::ViewTransform;
use super::super::{PointerCapture, ViewModel};
use super::interaction::{PointerEvent, PointerTarget};
use super::scene::{Scene, SceneLink, SceneNode};

const CARD_PADDING: Vec2 = vec2(10.0, 8.0);
const CARD_WRAP_WIDTH: f32 = 180.0;
const CARD_BODY_CHARS: usize = 160;
const LINK_LABEL_CHARS: usize = 32;
/// Screen pixels a press may wander before it counts as a move.
const DRAG_SLOP: f32 = 3.0;

struct CardLayout {
    title: Option<Arc<Galley>>,
    body: Arc<Galley>,
    size: Vec2,
}

fn layout_card(painter: &Painter, content: &NodeContent, scale: f32) -> CardLayout {
    let wrap_width = CARD_WRAP_WIDTH * scale;
    let (title, body) = match content {
        NodeContent::Text(text) => (None, text.as_str()),
        NodeContent::Card { title, body } => (Some(title.as_str()), body.as_str()),
    };

    let title = title.map(|title| {
        painter.layout(
            title.to_owned(),
            FontId::proportional(14.0 * scale),
            Color32::from_gray(245),
            wrap_width,
        )
    });
    let body = painter.layout(
        truncate_label(body, CARD_BODY_CHARS),
        FontId::proportional(12.0 * scale),
        Color32::from_gray(215),
        wrap_width,
    );

    let title_size = title.as_ref().map_or(Vec2::ZERO, |galley| galley.size());
    let gap = if title.is_some() { 4.0 * scale } else { 0.0 };
    let size = vec2(
        title_size.x.max(body.size().x),
        title_size.y + gap + body.size().y,
    ) + CARD_PADDING * scale * 2.0;

    CardLayout { title, body, size }
}

fn to_canvas(rect: Rect, transform: ViewTransform, world: Pos2) -> Pos2 {
    rect.min + transform.world_to_screen(world).to_vec2()
}

/// Primary button state for one egui frame, in canvas coordinates.
#[derive(Clone, Copy, Debug, Default)]
struct PointerFrame {
    pressed: bool,
    released: bool,
    down: bool,
    hovered: bool,
    pos: Option<Pos2>,
    moved: bool,
}

/// Advances the tracked press by one frame and returns the controller events
/// it produced. A press and release reported in the same frame yield both
/// `Down` and `Up`.
fn pointer_events(
    capture: &mut Option<PointerCapture>,
    frame: PointerFrame,
    now: Duration,
    hit: impl Fn(Pos2) -> PointerTarget,
) -> Vec<PointerEvent> {
    let mut events = Vec::new();

    if frame.pressed
        && frame.hovered
        && let Some(pos) = frame.pos
    {
        *capture = Some(PointerCapture {
            origin: pos,
            moving: false,
        });
        events.push(PointerEvent::Down {
            pos,
            target: hit(pos),
            time: now,
        });
        if !frame.released {
            return events;
        }
    }

    let Some(mut current) = *capture else {
        return events;
    };

    if frame.released {
        *capture = None;
        events.push(PointerEvent::Up {
            pos: frame.pos.unwrap_or(current.origin),
            time: now,
        });
        return events;
    }

    let Some(pos) = frame.pos.filter(|_| frame.down) else {
        *capture = None;
        events.push(PointerEvent::Leave);
        return events;
    };

    if !current.moving && pos.distance(current.origin) > DRAG_SLOP {
        current.moving = true;
        events.push(PointerEvent::Move { pos });
    } else if current.moving && frame.moved {
        events.push(PointerEvent::Move { pos });
    }
    *capture = Some(current);
    events
}

impl ViewModel {
    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        self.engine.set_viewport(rect.size());

        // Hit testing uses what is on screen right now.
        let shown = self.engine.scene();
        self.feed_pointer(ui, rect, &response, &shown);

        self.engine.advance(self.elapsed);
        self.engine.animation_frame();

        let scene = self.engine.scene();
        let transform = self.engine.transform();
        draw_background(&painter, rect, transform);

        for node in &scene.nodes {
            let measured = layout_card(&painter, &node.content, 1.0);
            self.engine.measure(&node.id, measured.size);
        }

        let selected = self.engine.selected().map(str::to_owned);
        for link in &scene.links {
            Self::draw_link(&painter, rect, transform, link, selected.as_deref());
        }

        let mut animating = false;
        for node in &scene.nodes {
            animating |= Self::draw_node(ui, &painter, rect, transform, node);
        }

        let hovered = ui
            .input(|input| input.pointer.hover_pos())
            .filter(|pointer| rect.contains(*pointer))
            .and_then(|pointer| {
                let world = transform.screen_to_world(pointer - rect.min.to_vec2());
                scene.node_at(world)
            });
        if self.engine.dragging().is_some() {
            ui.output_mut(|output| output.cursor_icon = egui::CursorIcon::Grabbing);
        } else if hovered.is_some() {
            ui.output_mut(|output| output.cursor_icon = egui::CursorIcon::PointingHand);
        }

        if scene.nodes.is_empty() {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "No nodes yet",
                FontId::proportional(14.0),
                Color32::from_gray(160),
            );
        }

        if animating || self.pointer.is_some() || self.engine.is_running() {
            ui.ctx().request_repaint();
        }
    }

    /// Turns raw egui pointer state into controller events. Positions are
    /// relative to the canvas origin.
    fn feed_pointer(&mut self, ui: &Ui, rect: Rect, response: &Response, scene: &Scene) {
        let (pressed, released, down, pointer, delta, scroll) = ui.input(|input| {
            (
                input.pointer.primary_pressed(),
                input.pointer.primary_released(),
                input.pointer.primary_down(),
                input.pointer.interact_pos(),
                input.pointer.delta(),
                input.raw_scroll_delta.y,
            )
        });
        let local = pointer.map(|pointer| pointer - rect.min.to_vec2());

        if response.hovered()
            && scroll.abs() > f32::EPSILON
            && let Some(local) = local
        {
            self.engine.handle_pointer(PointerEvent::Wheel {
                pos: local,
                delta_y: -scroll,
            });
        }

        let frame = PointerFrame {
            pressed,
            released,
            down,
            hovered: response.hovered(),
            pos: local,
            moved: delta != Vec2::ZERO,
        };
        let transform = self.engine.transform();
        let events = pointer_events(&mut self.pointer, frame, self.elapsed, |local| {
            scene
                .node_at(transform.screen_to_world(local))
                .map_or(PointerTarget::Background, |node| {
                    PointerTarget::Node(node.id.clone())
                })
        });
        for event in events {
            self.engine.handle_pointer(event);
        }
    }

    fn draw_link(
        painter: &Painter,
        rect: Rect,
        transform: ViewTransform,
        link: &SceneLink,
        selected: Option<&str>,
    ) {
        let start = to_canvas(rect, transform, link.start);
        let end = to_canvas(rect, transform, link.end);
        let control = link.control.map(|control| to_canvas(rect, transform, control));
        let reach = control.unwrap_or(start);
        if !edge_visible(rect, start, end, 60.0) && !edge_visible(rect, reach, end, 60.0) {
            return;
        }

        let touches_selection = selected
            .is_some_and(|selected| selected == link.source || selected == link.target);
        let color = if touches_selection {
            blend_color(LINK_COLOR, SELECTED_COLOR, 0.7)
        } else if selected.is_some() {
            dim_color(LINK_COLOR, 0.5)
        } else {
            LINK_COLOR
        };
        let zoom_sqrt = transform.k.sqrt();
        let stroke = Stroke::new((1.4 * zoom_sqrt).clamp(0.6, 3.2), color);

        match control {
            Some(control) => {
                painter.add(QuadraticBezierShape::from_points_stroke(
                    [start, control, end],
                    false,
                    Color32::TRANSPARENT,
                    stroke,
                ));
            }
            None => {
                painter.line_segment([start, end], stroke);
            }
        }

        if let Some(arrow) = link.arrow {
            let length = (10.0 * transform.k).clamp(4.0, 18.0);
            let tip = to_canvas(rect, transform, arrow.tip);
            let back = tip - arrow.direction * length;
            let side = vec2(-arrow.direction.y, arrow.direction.x) * (length * 0.5);
            painter.add(Shape::convex_polygon(
                vec![tip, back + side, back - side],
                color,
                Stroke::NONE,
            ));
        }

        if let Some((label, anchor)) = &link.label
            && transform.k > 0.35
        {
            painter.text(
                to_canvas(rect, transform, *anchor),
                Align2::CENTER_BOTTOM,
                truncate_label(label, LINK_LABEL_CHARS),
                FontId::proportional((11.0 * transform.k).clamp(8.0, 18.0)),
                LABEL_COLOR,
            );
        }
    }

    /// Paints one card. Returns true while its selection animation runs.
    fn draw_node(
        ui: &Ui,
        painter: &Painter,
        rect: Rect,
        transform: ViewTransform,
        node: &SceneNode,
    ) -> bool {
        let card = Rect::from_min_max(
            to_canvas(rect, transform, node.rect.min),
            to_canvas(rect, transform, node.rect.max),
        );
        if !rect.intersects(card) {
            return false;
        }

        let selection_mix = ui.ctx().animate_bool(
            ui.make_persistent_id(("node-selection", node.id.as_str())),
            node.selected,
        );
        let corner = 6.0 * transform.k.min(1.5);

        painter.rect_filled(
            card,
            corner,
            blend_color(CARD_FILL, Color32::from_rgb(58, 52, 34), selection_mix),
        );
        painter.rect_stroke(
            card,
            corner,
            Stroke::new(
                1.0 + selection_mix * 1.2,
                blend_color(CARD_STROKE, SELECTED_COLOR, selection_mix),
            ),
            StrokeKind::Inside,
        );

        if node.pinned {
            painter.circle_filled(
                card.right_top() + vec2(-6.0, 6.0) * transform.k.min(1.0),
                (3.0 * transform.k).clamp(1.5, 4.0),
                PINNED_COLOR,
            );
        }

        if transform.k >= 0.3 {
            let layout = layout_card(painter, &node.content, transform.k);
            let mut cursor = card.min + CARD_PADDING * transform.k;
            if let Some(title) = layout.title {
                let height = title.size().y;
                painter.galley(cursor, title, Color32::WHITE);
                cursor.y += height + 4.0 * transform.k;
            }
            painter.galley(cursor, layout.body, Color32::WHITE);
        }

        selection_mix > 0.0 && selection_mix < 1.0
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::pos2;

    use super::*;

    fn on_node(_: Pos2) -> PointerTarget {
        PointerTarget::Node("a".to_owned())
    }

    fn held(pos: Pos2) -> PointerFrame {
        PointerFrame {
            down: true,
            hovered: true,
            pos: Some(pos),
            ..Default::default()
        }
    }

    #[test]
    fn tap_within_one_frame_yields_press_and_release() {
        let mut capture = None;
        let frame = PointerFrame {
            pressed: true,
            released: true,
            hovered: true,
            pos: Some(pos2(10.0, 20.0)),
            ..Default::default()
        };
        let events = pointer_events(&mut capture, frame, Duration::from_millis(40), on_node);
        assert_eq!(
            events,
            vec![
                PointerEvent::Down {
                    pos: pos2(10.0, 20.0),
                    target: PointerTarget::Node("a".to_owned()),
                    time: Duration::from_millis(40),
                },
                PointerEvent::Up {
                    pos: pos2(10.0, 20.0),
                    time: Duration::from_millis(40),
                },
            ]
        );
        assert!(capture.is_none());

        let idle = pointer_events(
            &mut capture,
            PointerFrame::default(),
            Duration::from_millis(60),
            on_node,
        );
        assert!(idle.is_empty());
    }

    #[test]
    fn moves_start_only_past_the_slop() {
        let mut capture = None;
        let press = PointerFrame {
            pressed: true,
            ..held(pos2(0.0, 0.0))
        };
        pointer_events(&mut capture, press, Duration::ZERO, on_node);

        let jitter = PointerFrame {
            moved: true,
            ..held(pos2(2.0, 0.0))
        };
        assert!(pointer_events(&mut capture, jitter, Duration::ZERO, on_node).is_empty());

        let drag = PointerFrame {
            moved: true,
            ..held(pos2(8.0, 0.0))
        };
        assert_eq!(
            pointer_events(&mut capture, drag, Duration::ZERO, on_node),
            vec![PointerEvent::Move { pos: pos2(8.0, 0.0) }]
        );
        assert!(capture.is_some_and(|capture| capture.moving));
    }

    #[test]
    fn lost_button_is_reported_as_leave() {
        let mut capture = None;
        let press = PointerFrame {
            pressed: true,
            ..held(pos2(5.0, 5.0))
        };
        pointer_events(&mut capture, press, Duration::ZERO, on_node);

        let gone = PointerFrame {
            hovered: true,
            pos: Some(pos2(5.0, 5.0)),
            ..Default::default()
        };
        assert_eq!(
            pointer_events(&mut capture, gone, Duration::ZERO, on_node),
            vec![PointerEvent::Leave]
        );
        assert!(capture.is_none());
    }

    #[test]
    fn presses_outside_the_canvas_are_ignored() {
        let mut capture = None;
        let frame = PointerFrame {
            pressed: true,
            hovered: false,
            ..held(pos2(5.0, 5.0))
        };
        assert!(pointer_events(&mut capture, frame, Duration::ZERO, on_node).is_empty());
        assert!(capture.is_none());
    }
}
