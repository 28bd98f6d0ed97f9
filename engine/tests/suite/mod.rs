mod contact_gating;
mod delivery;
mod interruption;
mod limits;
