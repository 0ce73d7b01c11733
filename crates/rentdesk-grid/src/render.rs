// ── Markup rendering ──
//
// Precedence is fixed: loading, then empty, then toolbar + body + pagination.
// Every row-derived string goes through `Node::Text` or an escaped attribute;
// only formatter output and built-in glyphs are inserted raw.

use crate::action::Action;
use crate::column::Column;
use crate::config::{GridConfig, MobileLayout, SortDirection};
use crate::format::{Locale, cell_markup, plain_value};
use crate::html::{Element, Node};
use crate::row::{Row, display_string, value_at};
use crate::state::{GridState, Page};
use crate::surface::GridEnv;

/// Number of page links shown around the current page.
pub const PAGE_WINDOW: usize = 5;

/// Everything one render pass reads.
pub(crate) struct RenderContext<'a> {
    pub config: &'a GridConfig,
    pub state: &'a GridState,
    pub env: &'a GridEnv,
    pub page: &'a Page,
}

impl RenderContext<'_> {
    fn is_mobile(&self) -> bool {
        self.env.device.is_mobile()
    }

    fn is_admin(&self) -> bool {
        self.env.user_is_admin()
    }

    fn row_id(&self, row: &Row) -> String {
        self.config.identity.id_of(row)
    }

    fn rows<'a>(&'a self, indices: &'a [usize]) -> impl Iterator<Item = &'a Row> + 'a {
        let data = &self.state.data;
        indices.iter().filter_map(move |&i| data.get(i))
    }
}

/// Render the whole grid to a markup string.
pub(crate) fn render(ctx: &RenderContext<'_>) -> String {
    let text = &ctx.env.locale.text;
    let mut nodes: Vec<Node> = Vec::new();

    if ctx.state.loading {
        if ctx.config.search.enabled {
            nodes.push(toolbar(ctx).into());
        }
        let message = ctx
            .config
            .loading_message
            .as_deref()
            .unwrap_or(&text.loading_message);
        nodes.push(Element::new("div").class("grid-loading").text(message).into());
        return to_html(&nodes);
    }

    if ctx.state.filtered.is_empty() {
        if ctx.config.search.enabled {
            nodes.push(toolbar(ctx).into());
        }
        let message = ctx
            .config
            .empty_message
            .as_deref()
            .unwrap_or(&text.empty_message);
        nodes.push(Element::new("div").class("grid-empty").text(message).into());
        return to_html(&nodes);
    }

    if ctx.config.search.enabled || ctx.config.pagination.enabled {
        nodes.push(toolbar(ctx).into());
    }
    if ctx.is_mobile() && ctx.config.responsive.mobile == MobileLayout::Cards {
        nodes.push(mobile_cards(ctx).into());
    } else {
        nodes.push(table(ctx).into());
    }
    if ctx.config.pagination.enabled {
        if let Some(nav) = pagination(ctx) {
            nodes.push(nav.into());
        }
    }
    to_html(&nodes)
}

fn to_html(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        node.write_to(&mut out);
    }
    out
}

// ── Toolbar ─────────────────────────────────────────────────────────

fn toolbar(ctx: &RenderContext<'_>) -> Element {
    let text = &ctx.env.locale.text;
    let mut bar = Element::new("div").class("grid-toolbar");

    if ctx.config.search.enabled {
        let placeholder = ctx
            .config
            .search
            .placeholder
            .as_deref()
            .unwrap_or(&text.search_placeholder);
        bar = bar.child(
            Element::new("div").class("grid-search").child(
                Element::new("input")
                    .class("form-control grid-search-input")
                    .attr("type", "text")
                    .attr("placeholder", placeholder)
                    .attr("value", ctx.state.search_term.as_str()),
            ),
        );
    }

    if ctx.config.pagination.enabled && !ctx.state.loading {
        let total = ctx.state.filtered.len();
        let (start, end) = if ctx.page.row_count == 0 {
            (0, 0)
        } else {
            (ctx.page.first_row + 1, ctx.page.first_row + ctx.page.row_count)
        };
        bar = bar.child(Element::new("div").class("grid-info").child(
            Element::new("span").text(format!(
                "{start}-{end} {} {total} {}",
                text.of, text.records
            )),
        ));

        let options = &ctx.config.pagination.page_size_options;
        if !options.is_empty() {
            let select = Element::new("select")
                .class("form-select form-select-sm grid-page-size")
                .attr("title", text.per_page.as_str())
                .children(options.iter().map(|&n| {
                    Element::new("option")
                        .attr("value", n.to_string())
                        .flag_if(n == ctx.state.page_size, "selected")
                        .text(n.to_string())
                        .into()
                }));
            bar = bar.child(
                Element::new("div")
                    .class("grid-page-size-wrapper")
                    .child(select)
                    .child(Element::new("span").text(text.per_page.as_str())),
            );
        }
    }
    bar
}

// ── Desktop table ───────────────────────────────────────────────────

fn align_class(column: &Column) -> String {
    column
        .align
        .map(|a| format!("text-{a}"))
        .unwrap_or_default()
}

fn table(ctx: &RenderContext<'_>) -> Element {
    let config = ctx.config;
    let mut head = Element::new("tr");

    if config.selection.enabled {
        let mut th = Element::new("th").attr("width", "50");
        if config.selection.multiple {
            let all_selected = ctx.state.filtered.iter().all(|&i| {
                ctx.state
                    .data
                    .get(i)
                    .is_some_and(|row| ctx.state.selected.contains(&ctx.row_id(row)))
            });
            th = th.child(
                Element::new("input")
                    .class("grid-select-all")
                    .attr("type", "checkbox")
                    .flag_if(all_selected, "checked"),
            );
        }
        head = head.child(th);
    }

    for column in &config.columns {
        head = head.child(header_cell(ctx, column));
    }

    if !config.actions.is_empty() {
        head = head.child(
            Element::new("th")
                .class("text-center")
                .attr("width", "120")
                .text(ctx.env.locale.text.actions_header.as_str()),
        );
    }

    let mut body = Element::new("tbody");
    for (label, indices) in &ctx.page.groups {
        if let Some(label) = label {
            body = body.child(group_header(ctx, label, indices.len()));
        }
        for row in ctx.rows(indices) {
            body = body.child(table_row(ctx, row));
        }
    }

    Element::new("div").class("table-responsive").child(
        Element::new("table")
            .class("table table-hover grid-table")
            .child(Element::new("thead").child(head))
            .child(body),
    )
}

fn header_cell(ctx: &RenderContext<'_>, column: &Column) -> Element {
    let sortable = column.sortable && ctx.config.sort.enabled;
    let is_sorted = ctx.state.sort_column.as_deref() == Some(column.key.as_str());

    let mut th = Element::new("th")
        .class(&align_class(column))
        .class_if(sortable, "sortable")
        .class_if(is_sorted, "active")
        .attr_opt("width", column.width.as_deref())
        .attr("data-column", column.key.as_str())
        .text(column.label.as_str());

    if sortable {
        let icon = match (is_sorted, ctx.state.sort_direction) {
            (false, _) => "",
            (true, SortDirection::Asc) => "↑",
            (true, SortDirection::Desc) => "↓",
        };
        th = th.child(Element::new("span").class("sort-icon").raw(icon));
    }
    th
}

fn group_header(ctx: &RenderContext<'_>, label: &str, count: usize) -> Element {
    let shown = if label.is_empty() { "-" } else { label };
    Element::new("tr").class("group-header").child(
        Element::new("td")
            .attr("colspan", ctx.config.table_span().to_string())
            .child(Element::new("strong").text(shown))
            .text(format!(" ({count})")),
    )
}

fn table_row(ctx: &RenderContext<'_>, row: &Row) -> Element {
    let row_id = ctx.row_id(row);
    let selected = ctx.state.selected.contains(&row_id);

    let mut tr = Element::new("tr")
        .class_if(selected, "selected")
        .attr("data-row-id", row_id);

    if ctx.config.selection.enabled {
        tr = tr.child(
            Element::new("td").child(
                Element::new("input")
                    .class("grid-row-select")
                    .attr("type", "checkbox")
                    .flag_if(selected, "checked"),
            ),
        );
    }

    for column in &ctx.config.columns {
        let value = value_at(row, &column.key);
        tr = tr.child(
            Element::new("td")
                .class(&align_class(column))
                .raw(cell_markup(value, row, column, &ctx.env.locale)),
        );
    }

    if !ctx.config.actions.is_empty() {
        tr = tr.child(
            Element::new("td")
                .class("text-center")
                .children(action_buttons(ctx, row)),
        );
    }
    tr
}

// ── Mobile cards ────────────────────────────────────────────────────

fn mobile_cards(ctx: &RenderContext<'_>) -> Element {
    let mut wrapper = Element::new("div").class("grid-mobile-cards");
    for (label, indices) in &ctx.page.groups {
        if let Some(label) = label {
            let shown = if label.is_empty() { "-" } else { label.as_str() };
            wrapper = wrapper.child(
                Element::new("div")
                    .class("grid-card-group")
                    .child(Element::new("strong").text(shown))
                    .text(format!(" ({})", indices.len())),
            );
        }
        for row in ctx.rows(indices) {
            wrapper = wrapper.child(mobile_card(ctx, row));
        }
    }
    wrapper
}

fn mobile_card(ctx: &RenderContext<'_>, row: &Row) -> Element {
    let columns = &ctx.config.columns;
    let title = columns.iter().find(|c| c.card_title).or_else(|| columns.first());
    let row_id = ctx.row_id(row);
    let selected = ctx.state.selected.contains(&row_id);

    let mut card = Element::new("div")
        .class("grid-card")
        .class_if(selected, "selected")
        .attr("data-row-id", row_id);

    if let Some(column) = title {
        let heading = value_at(row, &column.key)
            .map_or_else(|| column.empty_display().to_string(), display_string);
        card = card.child(
            Element::new("div")
                .class("card-header")
                .child(Element::new("strong").text(heading)),
        );
    }

    let fields = columns
        .iter()
        .filter(|c| !c.hide_on_mobile && title.is_none_or(|t| t.key != c.key))
        .map(|column| {
            let value = value_at(row, &column.key);
            Element::new("div")
                .class("card-field")
                .child(
                    Element::new("span")
                        .class("field-label")
                        .text(format!("{}:", column.label)),
                )
                .child(
                    Element::new("span")
                        .class("field-value")
                        .raw(cell_markup(value, row, column, &ctx.env.locale)),
                )
                .into()
        });
    card = card.child(Element::new("div").class("card-body").children(fields));

    if !ctx.config.actions.is_empty() {
        card = card.child(
            Element::new("div")
                .class("card-actions")
                .children(action_buttons(ctx, row)),
        );
    }
    card
}

// ── Actions ─────────────────────────────────────────────────────────

fn action_buttons(ctx: &RenderContext<'_>, row: &Row) -> Vec<Node> {
    let is_admin = ctx.is_admin();
    let row_id = ctx.row_id(row);
    ctx.config
        .actions
        .iter()
        .filter(|action| action.is_visible(row, is_admin))
        .map(|action| action_button(action, &row_id, ctx.is_mobile()).into())
        .collect()
}

fn action_button(action: &Action, row_id: &str, mobile: bool) -> Element {
    let label = action.label.as_deref().unwrap_or_default();
    let mut button = Element::new("button")
        .class(&format!("btn btn-{} btn-sm grid-action-btn", action.variant))
        .attr("type", "button")
        .attr("data-action", action.name.as_str())
        .attr("data-row-id", row_id)
        .attr("title", label);

    if let Some(icon) = &action.icon {
        button = button.child(Element::new("i").class(&format!("bi bi-{icon}")));
    }
    if !mobile && !label.is_empty() {
        button = button.text(format!(" {label}"));
    }
    button
}

// ── Pagination ──────────────────────────────────────────────────────

/// First and last page link shown for `current` out of `total` pages.
pub(crate) fn page_window(current: usize, total: usize) -> (usize, usize) {
    let start = current.saturating_sub(PAGE_WINDOW / 2).max(1);
    let end = (start + PAGE_WINDOW - 1).min(total);
    let start = if end + 1 - start < PAGE_WINDOW {
        (end + 1).saturating_sub(PAGE_WINDOW).max(1)
    } else {
        start
    };
    (start, end)
}

fn page_link(page: usize, label: Node, disabled: bool, active: bool) -> Node {
    Element::new("li")
        .class("page-item")
        .class_if(disabled, "disabled")
        .class_if(active, "active")
        .child(
            Element::new("a")
                .class("page-link grid-page-btn")
                .attr("data-page", page.to_string())
                .child(label),
        )
        .into()
}

fn pagination(ctx: &RenderContext<'_>) -> Option<Element> {
    let total = ctx.page.total_pages;
    if total <= 1 {
        return None;
    }
    let text = &ctx.env.locale.text;
    let current = ctx.state.current_page;
    let (start, end) = page_window(current, total);

    let mut links = Vec::with_capacity(end + 3 - start);
    links.push(page_link(
        current.saturating_sub(1),
        Node::text(text.previous.as_str()),
        current <= 1,
        false,
    ));
    for page in start..=end {
        links.push(page_link(page, Node::text(page.to_string()), false, page == current));
    }
    links.push(page_link(
        current + 1,
        Node::text(text.next.as_str()),
        current >= total,
        false,
    ));

    Some(
        Element::new("div").class("grid-pagination").child(
            Element::new("nav").child(
                Element::new("ul")
                    .class("pagination pagination-sm")
                    .children(links),
            ),
        ),
    )
}

/// Unescaped cell text for each visible column, used by plain-text outputs.
pub fn plain_cells(row: &Row, columns: &[Column], locale: &Locale) -> Vec<String> {
    columns
        .iter()
        .map(|column| plain_value(value_at(row, &column.key), column, locale))
        .collect()
}
