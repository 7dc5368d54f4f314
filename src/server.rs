//! HTTP routes. Every handler loads a group snapshot from the [`Repository`],
//! runs engine functions on it and, for mutations, saves it back.
use std::collections::HashMap;

use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpResponse, ResponseError};
use log::{error, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::balance::compute_balance_from_expenses;
use crate::error::LedgerError;
use crate::export;
use crate::filter::{filter_expenses, ExpenseFilter};
use crate::report::Report;
use crate::repository::{Repository, RepositoryError};
use crate::schemas::{
    AppData, Expense, ExpenseDraft, Group, GroupDetails, GroupId, MemberId, NewMember, Split,
    SplitPolicy,
};
use crate::settlement::{optimize_settlements, Settlement};
use crate::split;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("group `{group}`: {source}")]
    InvalidGroup { group: GroupId, source: LedgerError },
    #[error("{0}")]
    BadRequest(String),
    #[error("export failed: {0}")]
    Export(#[from] csv::Error),
}

#[derive(Serialize)]
struct ErrorJson {
    error: String,
}

fn status_for_ledger_error(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::MemberNotFound(_) | LedgerError::ExpenseNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::MemberInUse(_) | LedgerError::DuplicateMemberName(_) => StatusCode::CONFLICT,
        LedgerError::NonPositiveAmount(_)
        | LedgerError::EmptyParticipants
        | LedgerError::InvalidSplit { .. }
        | LedgerError::NegativeShare { .. }
        | LedgerError::DuplicateParticipant(_)
        | LedgerError::DuplicateMember(_)
        | LedgerError::DanglingReference(_)
        | LedgerError::BlankName(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Ledger(err) => status_for_ledger_error(err),
            ServerError::InvalidGroup { source, .. } => status_for_ledger_error(source),
            ServerError::Repository(RepositoryError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::Repository(
                RepositoryError::AlreadyExists(_) | RepositoryError::Conflict(_),
            ) => StatusCode::CONFLICT,
            ServerError::Repository(RepositoryError::Unavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error = if status.is_server_error() {
            error!("{self}");
            match self {
                ServerError::Repository(_) => "storage unavailable".to_string(),
                _ => "internal server error".to_string(),
            }
        } else {
            self.to_string()
        };
        HttpResponse::build(status).json(ErrorJson { error })
    }
}

/// Loads a group, applies `change` and stores it as the next revision.
/// Nothing is saved when `change` fails, and the request fails with a
/// conflict when another request stored the group in between.
async fn mutate<R, T>(
    repo: &R,
    id: &str,
    change: impl FnOnce(&mut Group) -> Result<T, LedgerError>,
) -> Result<(Group, T), ServerError>
where
    R: Repository,
{
    let mut group = repo.load(id).await?;
    let loaded = group.revision();
    let out = change(&mut group)?;
    group.bump_revision();
    repo.update(&group, loaded).await?;
    Ok((group, out))
}

#[derive(Deserialize, Serialize)]
pub struct GroupNameJson {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

async fn list_groups<R: Repository>(repo: web::Data<R>) -> Result<HttpResponse, ServerError> {
    let groups = repo.list().await?;
    Ok(HttpResponse::Ok().json(groups))
}

async fn add_group<R: Repository>(
    repo: web::Data<R>,
    id: web::Path<String>,
    json: web::Json<GroupNameJson>,
) -> Result<HttpResponse, ServerError> {
    let json = json.into_inner();
    let mut group = Group::with_id(id.into_inner(), json.name.clone());
    group.update_details(GroupDetails {
        name: Some(json.name),
        description: json.description,
    })?;
    repo.create(&group).await?;
    info!("Group {} added", group.id());
    Ok(HttpResponse::Created().json(group))
}

async fn get_group<R: Repository>(
    repo: web::Data<R>,
    id: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let group = repo.load(&id).await?;
    Ok(HttpResponse::Ok().json(group))
}

async fn update_group<R: Repository>(
    repo: web::Data<R>,
    id: web::Path<String>,
    json: web::Json<GroupDetails>,
) -> Result<HttpResponse, ServerError> {
    let (group, ()) = mutate(repo.get_ref(), &id, |g| g.update_details(json.into_inner())).await?;
    Ok(HttpResponse::Ok().json(group))
}

async fn add_member<R: Repository>(
    repo: web::Data<R>,
    id: web::Path<String>,
    json: web::Json<NewMember>,
) -> Result<HttpResponse, ServerError> {
    let (_, member) = mutate(repo.get_ref(), &id, |g| {
        g.add_member(json.into_inner()).cloned()
    })
    .await?;
    info!("Member {} added to group {}", member.id, id);
    Ok(HttpResponse::Created().json(member))
}

async fn remove_member<R: Repository>(
    repo: web::Data<R>,
    path: web::Path<(String, MemberId)>,
) -> Result<HttpResponse, ServerError> {
    let (id, member_id) = path.into_inner();
    let (_, member) = mutate(repo.get_ref(), &id, |g| g.remove_member(&member_id)).await?;
    info!("Member {} removed from group {}", member.id, id);
    Ok(HttpResponse::Ok().json(member))
}

async fn list_expenses<R: Repository>(
    repo: web::Data<R>,
    id: web::Path<String>,
    filter: web::Query<ExpenseFilter>,
) -> Result<HttpResponse, ServerError> {
    let group = repo.load(&id).await?;
    Ok(HttpResponse::Ok().json(filter_expenses(group.expenses(), &filter)))
}

async fn add_expense<R: Repository>(
    repo: web::Data<R>,
    id: web::Path<String>,
    expense: web::Json<ExpenseDraft>,
) -> Result<HttpResponse, ServerError> {
    let (_, expense) = mutate(repo.get_ref(), &id, |g| {
        g.add_expense(expense.into_inner()).cloned()
    })
    .await?;
    info!("Expense {} added to group {}", expense.id, id);
    Ok(HttpResponse::Created().json(expense))
}

async fn update_expense<R: Repository>(
    repo: web::Data<R>,
    path: web::Path<(String, String)>,
    expense: web::Json<ExpenseDraft>,
) -> Result<HttpResponse, ServerError> {
    let (id, expense_id) = path.into_inner();
    let (_, expense) = mutate(repo.get_ref(), &id, |g| {
        g.update_expense(&expense_id, expense.into_inner()).cloned()
    })
    .await?;
    info!("Expense {} updated in group {}", expense.id, id);
    Ok(HttpResponse::Ok().json(expense))
}

async fn remove_expense<R: Repository>(
    repo: web::Data<R>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ServerError> {
    let (id, expense_id) = path.into_inner();
    let (_, expense) = mutate(repo.get_ref(), &id, |g| g.remove_expense(&expense_id)).await?;
    info!("Expense {} removed from group {}", expense.id, id);
    Ok(HttpResponse::Ok().json(expense))
}

#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct NamedBalance {
    pub member_id: MemberId,
    pub name: String,
    pub amount: f64,
}

#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct NamedSettlement {
    #[serde(flatten)]
    pub settlement: Settlement,
    pub from_name: String,
    pub to_name: String,
}

fn member_name(group: &Group, id: &str) -> String {
    group.member(id).map(|m| m.name.clone()).unwrap_or_default()
}

async fn get_balances<R: Repository>(
    repo: web::Data<R>,
    id: web::Path<String>,
    filter: web::Query<ExpenseFilter>,
) -> Result<HttpResponse, ServerError> {
    let group = repo.load(&id).await?;
    let expenses = filter_expenses(group.expenses(), &filter);
    let balances = compute_balance_from_expenses(group.members(), expenses)?;
    let named: Vec<NamedBalance> = balances
        .iter()
        .map(|b| NamedBalance {
            member_id: b.member_id.clone(),
            name: member_name(&group, &b.member_id),
            amount: b.amount,
        })
        .collect();
    Ok(HttpResponse::Ok().json(named))
}

async fn get_settlements<R: Repository>(
    repo: web::Data<R>,
    id: web::Path<String>,
    filter: web::Query<ExpenseFilter>,
) -> Result<HttpResponse, ServerError> {
    let group = repo.load(&id).await?;
    let expenses = filter_expenses(group.expenses(), &filter);
    let balances = compute_balance_from_expenses(group.members(), expenses)?;
    let named: Vec<NamedSettlement> = optimize_settlements(&balances)
        .into_iter()
        .map(|settlement| NamedSettlement {
            from_name: member_name(&group, &settlement.from),
            to_name: member_name(&group, &settlement.to),
            settlement,
        })
        .collect();
    Ok(HttpResponse::Ok().json(named))
}

async fn get_report<R: Repository>(
    repo: web::Data<R>,
    id: web::Path<String>,
    filter: web::Query<ExpenseFilter>,
) -> Result<HttpResponse, ServerError> {
    let group = repo.load(&id).await?;
    let expenses: Vec<&Expense> = filter_expenses(group.expenses(), &filter);
    let report = Report::build(group.members(), &expenses)?;
    Ok(HttpResponse::Ok().json(report))
}

async fn export_group_csv<R: Repository>(
    repo: web::Data<R>,
    id: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let group = repo.load(&id).await?;
    let mut body = Vec::new();
    export::write_csv([&group], &mut body)?;
    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}.csv\"", group.id()),
        ))
        .body(body))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SplitPreviewJson {
    pub amount: f64,
    pub participants: Vec<MemberId>,
    pub policy: SplitPolicy,
    #[serde(default)]
    pub inputs: HashMap<MemberId, f64>,
}

#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct SplitPreview {
    pub splits: Vec<Split>,
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Computes splits for a form that is still being filled in.
async fn preview_split(json: web::Json<SplitPreviewJson>) -> HttpResponse {
    let json = json.into_inner();
    let splits = split::compute(json.amount, &json.participants, json.policy, &json.inputs);
    let check = split::check(json.amount, &json.participants, json.policy, &json.inputs);
    HttpResponse::Ok().json(SplitPreview {
        splits,
        valid: check.is_ok(),
        error: check.err().map(|e| e.to_string()),
    })
}

async fn export_all<R: Repository>(repo: web::Data<R>) -> Result<HttpResponse, ServerError> {
    let groups = repo.list().await?;
    Ok(HttpResponse::Ok().json(AppData::new(groups)))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
}

async fn import_all<R: Repository>(
    repo: web::Data<R>,
    json: web::Json<AppData>,
) -> Result<HttpResponse, ServerError> {
    let data = json.into_inner();
    for group in &data.groups {
        group
            .check_integrity()
            .map_err(|source| ServerError::InvalidGroup {
                group: group.id().to_string(),
                source,
            })?;
    }
    for group in &data.groups {
        repo.save(group).await?;
    }
    info!(
        "Imported {} groups (export version {})",
        data.groups.len(),
        data.version
    );
    Ok(HttpResponse::Ok().json(ImportSummary {
        imported: data.groups.len(),
    }))
}

fn json_error(err: actix_web::error::JsonPayloadError, _: &actix_web::HttpRequest) -> actix_web::Error {
    ServerError::BadRequest(err.to_string()).into()
}

fn query_error(err: actix_web::error::QueryPayloadError, _: &actix_web::HttpRequest) -> actix_web::Error {
    ServerError::BadRequest(err.to_string()).into()
}

pub fn configure<R: Repository + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .service(web::resource("/groups").route(web::get().to(list_groups::<R>)))
        .service(
            web::resource("/groups/{id}")
                .route(web::get().to(get_group::<R>))
                .route(web::put().to(add_group::<R>))
                .route(web::patch().to(update_group::<R>)),
        )
        .service(web::resource("/groups/{id}/members").route(web::post().to(add_member::<R>)))
        .service(
            web::resource("/groups/{id}/members/{member_id}")
                .route(web::delete().to(remove_member::<R>)),
        )
        .service(
            web::resource("/groups/{id}/expenses")
                .route(web::get().to(list_expenses::<R>))
                .route(web::post().to(add_expense::<R>)),
        )
        .service(
            web::resource("/groups/{id}/expenses/{expense_id}")
                .route(web::put().to(update_expense::<R>))
                .route(web::delete().to(remove_expense::<R>)),
        )
        .service(web::resource("/groups/{id}/balances").route(web::get().to(get_balances::<R>)))
        .service(
            web::resource("/groups/{id}/settlements").route(web::get().to(get_settlements::<R>)),
        )
        .service(web::resource("/groups/{id}/report").route(web::get().to(get_report::<R>)))
        .service(
            web::resource("/groups/{id}/export.csv").route(web::get().to(export_group_csv::<R>)),
        )
        .service(web::resource("/splits/preview").route(web::post().to(preview_split)))
        .service(web::resource("/export").route(web::get().to(export_all::<R>)))
        .service(web::resource("/import").route(web::post().to(import_all::<R>)));
}
