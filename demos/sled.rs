//! Walks one request through a two-level approval chain on a local sled db.
use approval_workflow::draft::RequestDraft;
use approval_workflow::request::{ApproveAction, Priority, Requester, RequestType};
use approval_workflow::service::ApprovalService;
use approval_workflow::store::SledRequestStore;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    let db = Arc::new(sled::open("sled")?);
    let service = ApprovalService::new(SledRequestStore::new(db)?);

    let request = service.create_request(
        RequestDraft::new(RequestType::VenueBooking, "Auditorium booking")
            .set_description("Two-day developer conference")
            .set_priority(Priority::High)
            .set_requester(Requester {
                user_id: "user_demo".to_string(),
                name: "Demo Requester".to_string(),
                email: "demo@example.edu".to_string(),
                department: "Events".to_string(),
                designation: "Organiser".to_string(),
            })
            .add_level("Facilities Manager")
            .add_level("Registrar"),
    )?;
    println!(
        "created {} with {} levels, status: {}",
        request.request_number,
        request.approval_workflow.len(),
        request.overall_status
    );

    let request = service.approve(
        &request.id,
        ApproveAction {
            approver_id: "user_fm".to_string(),
            approver_name: "Facilities Manager".to_string(),
            comments: Some("hall is free those dates".to_string()),
            signature: None,
        },
    )?;
    println!(
        "level 1 approved, now at level {} ({})",
        request.current_approval_level, request.overall_status
    );

    let request = service.approve(
        &request.id,
        ApproveAction {
            approver_id: "user_reg".to_string(),
            approver_name: "Registrar".to_string(),
            comments: None,
            signature: Some("sig:registrar".to_string()),
        },
    )?;
    println!("final status: {}", request.overall_status);

    println!("{:#?}", request.approval_workflow);

    Ok(())
}
