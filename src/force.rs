//! Force-directed layout for the small co-occurrence network.
//!
//! The simulation is a plain value: [`ForceSimulation::advance`] consumes one
//! state and returns the next, so callers decide when (and whether) to keep
//! ticking. Three forces act on the nodes each tick: pairwise repulsion,
//! springs along the links and a centering correction. Motion cools down
//! geometrically through `alpha` and the layout counts as settled once alpha
//! drops below `ALPHA_MIN`. Dragging a node pins it and stops the simulation.

use crate::layout::SqrtScale;
use log::debug;
use serde::Serialize;
use std::f64::consts::TAU;

pub const ALPHA_MIN: f64 = 0.001;
pub const VELOCITY_DECAY: f64 = 0.4;
pub const CHARGE_STRENGTH: f64 = -30.0;
pub const LINK_DISTANCE: f64 = 30.0;
/// Node radii are a square-root scale of the count over this range.
pub const NODE_RADIUS: (f64, f64) = (3.0, 15.0);
/// Gap between the largest node and the ring the nodes start on.
const RING_SPACING: f64 = 30.0;
const DEFAULT_TICKS: f64 = 300.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ForceNode {
    pub id: String,
    pub group: u32,
    pub count: usize,
    pub radius: f64,
    pub x: f64,
    pub y: f64,
    #[serde(skip)]
    pub vx: f64,
    #[serde(skip)]
    pub vy: f64,
    pub pinned: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ForceLink {
    pub source: usize,
    pub target: usize,
    pub value: f64,
    pub correlation: f64,
}

/// Node description before the simulation has placed it.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeSpec {
    pub id: String,
    pub group: u32,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ForceSimulation {
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<ForceNode>,
    pub links: Vec<ForceLink>,
    pub alpha: f64,
    pub ticks: usize,
    /// Set once a node has been dragged; no further ticks are applied.
    pub interrupted: bool,
    #[serde(skip)]
    alpha_decay: f64,
}

impl ForceSimulation {
    /// Place `nodes` evenly on a ring around the centre of a `width`×`height`
    /// area, ready to tick.
    ///
    /// # Arguments
    ///
    /// * `nodes` - The nodes, in display order
    /// * `links` - Edges as `(source index, target index, value, correlation)`
    /// * `width`, `height` - The drawing area
    ///
    /// # Returns
    ///
    /// A hot simulation (`alpha` = 1) whose nodes sit on a circle of radius
    /// `30 + largest node radius`. Links pointing at missing nodes are dropped.
    pub fn new(nodes: Vec<NodeSpec>, links: &[(usize, usize, f64, f64)], width: f64, height: f64) -> Self {
        let max_count = nodes.iter().map(|n| n.count).max().unwrap_or(0) as f64;
        let size = SqrtScale::new(max_count.max(1.0), NODE_RADIUS);
        let radii: Vec<f64> = nodes.iter().map(|n| size.map(n.count as f64)).collect();
        let ring = RING_SPACING + radii.iter().copied().fold(0.0, f64::max);
        let (cx, cy) = (width / 2.0, height / 2.0);
        let total = nodes.len().max(1) as f64;

        let nodes: Vec<ForceNode> = nodes
            .into_iter()
            .zip(radii)
            .enumerate()
            .map(|(i, (spec, radius))| {
                let angle = i as f64 / total * TAU;
                ForceNode {
                    id: spec.id,
                    group: spec.group,
                    count: spec.count,
                    radius,
                    x: cx + ring * angle.cos(),
                    y: cy + ring * angle.sin(),
                    vx: 0.0,
                    vy: 0.0,
                    pinned: false,
                }
            })
            .collect();

        let links = links
            .iter()
            .filter(|(s, t, _, _)| *s < nodes.len() && *t < nodes.len() && s != t)
            .map(|&(source, target, value, correlation)| ForceLink {
                source,
                target,
                value,
                correlation,
            })
            .collect();

        ForceSimulation {
            width,
            height,
            nodes,
            links,
            alpha: 1.0,
            ticks: 0,
            interrupted: false,
            alpha_decay: 1.0 - ALPHA_MIN.powf(1.0 / DEFAULT_TICKS),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.alpha < ALPHA_MIN
    }

    pub fn is_running(&self) -> bool {
        !self.interrupted && !self.is_settled() && !self.nodes.is_empty()
    }

    /// Advance the layout by one tick of length `dt`.
    ///
    /// A stopped simulation (settled or interrupted by a drag) is returned
    /// unchanged.
    pub fn advance(mut self, dt: f64) -> Self {
        if !self.is_running() {
            return self;
        }
        self.alpha += -self.alpha * self.alpha_decay;

        self.apply_links(dt);
        self.apply_charge(dt);
        self.apply_center();

        for node in &mut self.nodes {
            if node.pinned {
                node.vx = 0.0;
                node.vy = 0.0;
                continue;
            }
            node.vx *= 1.0 - VELOCITY_DECAY;
            node.vy *= 1.0 - VELOCITY_DECAY;
            node.x += node.vx * dt;
            node.y += node.vy * dt;
        }
        self.ticks += 1;
        self
    }

    /// Tick until the layout settles or `max_ticks` is reached.
    pub fn run_until_settled(self, max_ticks: usize) -> Self {
        let mut state = self;
        while state.is_running() && state.ticks < max_ticks {
            state = state.advance(1.0);
        }
        debug!(
            "force layout stopped after {} ticks (alpha {:.4})",
            state.ticks, state.alpha
        );
        state
    }

    /// Move node `index` to `(x, y)` and hold it there.
    ///
    /// Dragging ends the simulation: later calls to [`advance`](Self::advance)
    /// leave every node where it is.
    pub fn drag(mut self, index: usize, x: f64, y: f64) -> Self {
        if let Some(node) = self.nodes.get_mut(index) {
            node.x = x;
            node.y = y;
            node.vx = 0.0;
            node.vy = 0.0;
            node.pinned = true;
            self.interrupted = true;
        }
        self
    }

    /// Let a dragged node go again. It keeps its current position.
    pub fn release(mut self, index: usize) -> Self {
        if let Some(node) = self.nodes.get_mut(index) {
            node.pinned = false;
        }
        self
    }

    fn degrees(&self) -> Vec<usize> {
        let mut degree = vec![0usize; self.nodes.len()];
        for link in &self.links {
            degree[link.source] += 1;
            degree[link.target] += 1;
        }
        degree
    }

    fn apply_links(&mut self, dt: f64) {
        let degree = self.degrees();
        for (i, link) in self.links.iter().enumerate() {
            let (s, t) = (link.source, link.target);
            let strength = 1.0 / degree[s].min(degree[t]).max(1) as f64;
            let bias = degree[s] as f64 / (degree[s] + degree[t]) as f64;

            let source = &self.nodes[s];
            let target = &self.nodes[t];
            let mut dx = target.x + target.vx - source.x - source.vx;
            let mut dy = target.y + target.vy - source.y - source.vy;
            if dx == 0.0 && dy == 0.0 {
                (dx, dy) = jiggle(i);
            }
            let distance = (dx * dx + dy * dy).sqrt();
            let pull = (distance - LINK_DISTANCE) / distance * self.alpha * strength * dt;
            let (fx, fy) = (dx * pull, dy * pull);

            self.nodes[t].vx -= fx * bias;
            self.nodes[t].vy -= fy * bias;
            self.nodes[s].vx += fx * (1.0 - bias);
            self.nodes[s].vy += fy * (1.0 - bias);
        }
    }

    fn apply_charge(&mut self, dt: f64) {
        let count = self.nodes.len();
        for i in 0..count {
            let (mut ax, mut ay) = (0.0, 0.0);
            for j in 0..count {
                if i == j {
                    continue;
                }
                let mut dx = self.nodes[j].x - self.nodes[i].x;
                let mut dy = self.nodes[j].y - self.nodes[i].y;
                if dx == 0.0 && dy == 0.0 {
                    (dx, dy) = jiggle(i * count + j);
                }
                let mut l2 = dx * dx + dy * dy;
                if l2 < 1.0 {
                    l2 = l2.sqrt();
                }
                let push = CHARGE_STRENGTH * self.alpha * dt / l2;
                ax += dx * push;
                ay += dy * push;
            }
            self.nodes[i].vx += ax;
            self.nodes[i].vy += ay;
        }
    }

    fn apply_center(&mut self) {
        let free: Vec<usize> = (0..self.nodes.len()).filter(|&i| !self.nodes[i].pinned).collect();
        if free.is_empty() {
            return;
        }
        let n = free.len() as f64;
        let sx = free.iter().map(|&i| self.nodes[i].x).sum::<f64>() / n - self.width / 2.0;
        let sy = free.iter().map(|&i| self.nodes[i].y).sum::<f64>() / n - self.height / 2.0;
        for i in free {
            self.nodes[i].x -= sx;
            self.nodes[i].y -= sy;
        }
    }
}

// Tiny fixed displacement for coincident points.
fn jiggle(seed: usize) -> (f64, f64) {
    let angle = seed as f64 * 2.399_963_229_728_653;
    (1e-6 * angle.cos(), 1e-6 * angle.sin())
}
