use shared::protocol::{
    AdcpEns, EventTag, InitPlots, SerialComm, StatusReport, UpdateVoltPlot,
};
use tracing::{debug, info};

use crate::{error::ClientError, router::EventRouter};

/// Registers the display client's handler for every protocol tag.
pub fn register_telemetry_handlers(router: &mut EventRouter) -> Result<(), ClientError> {
    router.on(EventTag::Connect.as_str(), |projections, _event| {
        if projections.plot.seed_placeholder() {
            debug!("plot seeded with placeholder origin");
        }
        Ok(())
    })?;

    // Reserved: nothing is reset or re-requested on a drop.
    router.on(EventTag::Disconnect.as_str(), |_projections, _event| {
        info!("projections kept across disconnect");
        Ok(())
    })?;

    router.on(EventTag::StatusReport.as_str(), |projections, mut event| {
        let report: StatusReport = event.decode(EventTag::StatusReport)?;
        projections.apply_status_report(&report, event.ack.take());
        Ok(())
    })?;

    router.on(EventTag::SerialComm.as_str(), |projections, event| {
        let payload: SerialComm = event.decode(EventTag::SerialComm)?;
        projections.console.apply(payload, event.received_at);
        Ok(())
    })?;

    router.on(EventTag::AdcpEns.as_str(), |projections, event| {
        let payload: AdcpEns = event.decode(EventTag::AdcpEns)?;
        projections.ensemble.apply(payload);
        Ok(())
    })?;

    router.on(EventTag::InitPlots.as_str(), |projections, event| {
        let payload: InitPlots = event.decode(EventTag::InitPlots)?;
        projections.plot.init(payload.x, payload.y)
    })?;

    router.on(EventTag::UpdateVoltPlot.as_str(), |projections, event| {
        let payload: UpdateVoltPlot = event.decode(EventTag::UpdateVoltPlot)?;
        projections.plot.append(payload.x, payload.y)
    })?;

    Ok(())
}
