use crate::infra::ApiService;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use maud::{html, Markup, DOCTYPE};
use permit_hub::permits::{
    CityProfile, DashboardStats, Page, PermitQuery, PermitRecord, RunServiceError,
};
use std::sync::Arc;

/// What the browse page shows for one request.
pub(crate) struct BrowseVm<'a> {
    pub(crate) cities: &'a [CityProfile],
    pub(crate) query: PermitQuery,
    pub(crate) page: Option<Page<PermitRecord>>,
    pub(crate) stats: Option<DashboardStats>,
    pub(crate) error: Option<String>,
}

pub(crate) async fn browse_handler(
    State(service): State<Arc<ApiService>>,
    query: Result<Query<PermitQuery>, QueryRejection>,
) -> Response {
    let (query, mut error) = match query {
        Ok(Query(query)) => (query, None),
        Err(rejection) => (PermitQuery::default(), Some(rejection.body_text())),
    };

    let mut status = if error.is_some() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };

    let page = match service.list_permits(&query) {
        Ok(page) => Some(page),
        Err(err) => {
            status = match err {
                RunServiceError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error.get_or_insert(err.to_string());
            None
        }
    };
    let stats = match service.dashboard() {
        Ok(stats) => Some(stats),
        Err(err) => {
            tracing::warn!(error = %err, "dashboard statistics unavailable");
            None
        }
    };

    let vm = BrowseVm {
        cities: service.cities(),
        query,
        page,
        stats,
        error,
    };
    (status, browse_page(&vm)).into_response()
}

pub(crate) fn browse_page(vm: &BrowseVm<'_>) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { "Building Permits" }
            }
            body {
                header {
                    h1 { "Building Permits" }
                    @if let Some(stats) = &vm.stats {
                        p {
                            strong { (stats.total_permits) } " permits worth "
                            strong { "$" (thousands(stats.total_value)) }
                        }
                    }
                }
                main {
                    @if let Some(error) = &vm.error {
                        p class="error" role="alert" { (error) }
                    }
                    (filter_form(vm))
                    @if let Some(page) = &vm.page {
                        (results(page))
                        (pager(&vm.query, page))
                    }
                }
            }
        }
    }
}

fn filter_form(vm: &BrowseVm<'_>) -> Markup {
    let query = &vm.query;
    let selected_city = query.city.as_deref().unwrap_or_default();
    html! {
        form action="/" method="get" class="filters" {
            label {
                "City "
                select name="city" {
                    option value="" { "All cities" }
                    @for city in vm.cities {
                        option value=(city.key) selected[city.key == selected_city] { (city.name) }
                    }
                }
            }
            label {
                "Issued from "
                input type="date" name="start_date"
                    value=[query.start_date.map(|date| date.to_string())];
            }
            label {
                "to "
                input type="date" name="end_date"
                    value=[query.end_date.map(|date| date.to_string())];
            }
            label {
                "Minimum cost "
                input type="number" name="min_cost" min="0" value=[query.min_cost];
            }
            label {
                "Search "
                input type="search" name="search" value=[query.search.as_deref()];
            }
            input type="hidden" name="page_size" value=(query.page_size());
            button type="submit" { "Filter" }
        }
    }
}

fn results(page: &Page<PermitRecord>) -> Markup {
    html! {
        p { (page.count) " matching permits" }
        @if page.results.is_empty() {
            p { "No permits match these filters." }
        } @else {
            table {
                thead {
                    tr {
                        th { "City" }
                        th { "Permit" }
                        th { "Issued" }
                        th { "Address" }
                        th { "Description" }
                        th { "Estimated cost" }
                        th { "Contractor" }
                        th { "Source" }
                    }
                }
                tbody {
                    @for record in &page.results {
                        tr {
                            td { (record.city) }
                            td { (record.permit_id) }
                            td { (record.issue_date) }
                            td { (record.full_address) }
                            td { (record.description) }
                            td class="cost" { "$" (thousands(record.estimated_cost)) }
                            td { (record.contractor_name) }
                            td { (record.data_source) }
                        }
                    }
                }
            }
        }
    }
}

/// Previous/next buttons that resubmit the current filters.
fn pager(query: &PermitQuery, page: &Page<PermitRecord>) -> Markup {
    let last_page = page.count.div_ceil(page.page_size).max(1);
    html! {
        nav class="pager" {
            @if page.page > 1 {
                (page_button(query, page.page - 1, "Previous"))
            }
            span { "Page " (page.page) " of " (last_page) }
            @if page.page < last_page {
                (page_button(query, page.page + 1, "Next"))
            }
        }
    }
}

fn page_button(query: &PermitQuery, target: usize, label: &str) -> Markup {
    html! {
        form action="/" method="get" class="page" {
            @if let Some(city) = &query.city {
                input type="hidden" name="city" value=(city);
            }
            @if let Some(start) = query.start_date {
                input type="hidden" name="start_date" value=(start);
            }
            @if let Some(end) = query.end_date {
                input type="hidden" name="end_date" value=(end);
            }
            @if let Some(min_cost) = query.min_cost {
                input type="hidden" name="min_cost" value=(min_cost);
            }
            @if let Some(search) = &query.search {
                input type="hidden" name="search" value=(search);
            }
            input type="hidden" name="page_size" value=(query.page_size());
            input type="hidden" name="page" value=(target);
            button type="submit" { (label) }
        }
    }
}

fn thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}
