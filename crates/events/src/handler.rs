/// Decide and apply in one step, without persistence.
///
/// Handy in unit tests and for replaying a command against an in-memory
/// aggregate; the infrastructure dispatcher does the same plus storage.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: workshop_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
