/// SOAP implementation of the judge service port. Requests are plain
/// RPC envelopes over HTTP; every answer is coerced into strict types
/// before it leaves this module.
pub mod client;
pub mod coerce;
pub mod envelope;
pub mod mappers;
pub mod wsdl;
